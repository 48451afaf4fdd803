//! Integration tests for graph construction and scheduling

mod common;

use rant::config::{build_graph, parse_build};
use rant::error::GraphError;
use rant::graph::{schedule, DependencyGraph, Scheduler};
use std::collections::HashSet;

/// Small deterministic generator so graph shapes are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// Random DAG: target `tN` only depends on targets with a smaller index
fn random_dag(seed: u64, size: usize) -> DependencyGraph<()> {
    let mut rng = Lcg(seed);
    let mut graph = DependencyGraph::new();
    for i in 0..size {
        let mut deps = Vec::new();
        if i > 0 {
            for _ in 0..rng.below(4) {
                let dep = format!("t{}", rng.below(i as u64));
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
        }
        graph.add_target(format!("t{}", i), deps, None, vec![]).unwrap();
    }
    graph
}

fn closure(graph: &DependencyGraph<()>, roots: &[String]) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack: Vec<String> = roots.to_vec();
    while let Some(name) = stack.pop() {
        if seen.insert(name.clone()) {
            stack.extend(graph.get(&name).unwrap().dependencies().iter().cloned());
        }
    }
    seen
}

#[test]
fn test_acyclic_plans_are_complete_and_ordered() {
    for seed in 0..50 {
        let graph = random_dag(seed, 25);
        let mut rng = Lcg(seed ^ 0xdead_beef);
        let roots: Vec<String> = (0..1 + rng.below(3))
            .map(|_| format!("t{}", rng.below(25)))
            .collect();

        let plan = schedule(&graph, roots.as_slice()).unwrap();

        // Exactly once
        let unique: HashSet<&String> = plan.iter().collect();
        assert_eq!(unique.len(), plan.len(), "seed {}: duplicate in {}", seed, plan);

        // Exactly the requested closure
        let expected = closure(&graph, &roots);
        let actual: HashSet<String> = plan.iter().cloned().collect();
        assert_eq!(actual, expected, "seed {}", seed);

        // Dependencies first
        for name in &plan {
            let pos = plan.position(name).unwrap();
            for dep in graph.get(name).unwrap().dependencies() {
                assert!(
                    plan.position(dep).unwrap() < pos,
                    "seed {}: {} scheduled before its dependency {}",
                    seed,
                    name,
                    dep
                );
            }
        }
    }
}

#[test]
fn test_reachable_cycle_never_yields_plan() {
    for seed in 0..20 {
        let mut graph = random_dag(seed, 10);
        // Close a loop back through t0
        graph.add_target("loop-a", ["t0", "loop-b"], None, vec![]).unwrap();
        graph.add_target("loop-b", ["loop-a"], None, vec![]).unwrap();
        graph.add_target("root", ["t9", "loop-a"], None, vec![]).unwrap();

        match schedule(&graph, &["root"]) {
            Err(GraphError::CircularDependency { path }) => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"loop-a".to_string()));
                assert!(path.contains(&"loop-b".to_string()));
            }
            other => panic!("seed {}: expected a cycle, got {:?}", seed, other),
        }
    }
}

#[test]
fn test_clean_prepare_build_chain() {
    let mut graph: DependencyGraph<()> = DependencyGraph::new();
    graph.add_target("build", ["prepare"], None, vec![]).unwrap();
    graph.add_target("prepare", ["clean"], None, vec![]).unwrap();
    graph.add_target("clean", Vec::<String>::new(), None, vec![]).unwrap();

    let plan = schedule(&graph, &["build"]).unwrap();
    assert_eq!(plan.names(), vec!["clean", "prepare", "build"]);
}

#[test]
fn test_duplicate_target_rejected() {
    let mut graph: DependencyGraph<()> = DependencyGraph::new();
    graph.add_target("a", Vec::<String>::new(), None, vec![]).unwrap();
    let err = graph.add_target("a", Vec::<String>::new(), None, vec![]).unwrap_err();
    assert_eq!(err, GraphError::DuplicateTarget("a".to_string()));
}

#[test]
fn test_build_file_graph_schedules_like_ant() {
    let file = parse_build(
        r#"
targets:
  init: {}
  compile: { depends: init }
  test: { depends: "compile, init" }
  docs: { depends: [init] }
  dist: { depends: "test,docs" }
"#,
    )
    .unwrap();
    let graph = build_graph(&file).unwrap();

    let plan = schedule(&graph, &["dist"]).unwrap();
    assert_eq!(plan.names(), vec!["init", "compile", "test", "docs", "dist"]);
}

#[test]
fn test_whole_graph_check_from_build_file() {
    let file = parse_build(
        r#"
targets:
  fine: {}
  orphan: { depends: ghost }
"#,
    )
    .unwrap();
    let graph = build_graph(&file).unwrap();

    assert!(schedule(&graph, &["fine"]).is_ok());
    let err = Scheduler::new()
        .check_whole_graph(true)
        .schedule(&graph, &["fine"])
        .unwrap_err();
    assert!(matches!(err, GraphError::UnknownTarget { name, .. } if name == "ghost"));
}
