//! Execution order computation
//!
//! Depth-first post-order over the dependency graph, starting from each
//! requested target in the order given and following dependencies in their
//! declared order. The result is the smallest sequence containing the
//! requested targets and everything they depend on, each exactly once and
//! after all of its dependencies.

use crate::error::{GraphError, GraphResult};
use crate::graph::{DependencyGraph, Target};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument};

/// Linear execution order for a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    targets: Vec<String>,
}

impl ExecutionPlan {
    pub fn new(targets: Vec<String>) -> Self {
        ExecutionPlan { targets }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Target names as string slices
    pub fn names(&self) -> Vec<&str> {
        self.targets.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.iter().any(|t| t == name)
    }

    /// Position of `name` in the plan
    pub fn position(&self, name: &str) -> Option<usize> {
        self.targets.iter().position(|t| t == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.targets.iter()
    }
}

impl<'a> IntoIterator for &'a ExecutionPlan {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.targets.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Computes execution plans
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler {
    check_whole_graph: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also traverse targets not reached from the request
    ///
    /// Cycles and unknown references anywhere in the graph are then reported,
    /// while the plan still holds only what the request needs.
    pub fn check_whole_graph(mut self, check: bool) -> Self {
        self.check_whole_graph = check;
        self
    }

    /// Compute the plan for `requested`
    ///
    /// An empty request falls back to the graph's default target.
    #[instrument(skip_all, fields(requested = requested.len()))]
    pub fn schedule<S, R>(
        &self,
        graph: &DependencyGraph<S>,
        requested: &[R],
    ) -> GraphResult<ExecutionPlan>
    where
        R: AsRef<str>,
    {
        let roots: Vec<&str> = if requested.is_empty() {
            vec![graph.default_target().ok_or(GraphError::NoTargetRequested)?]
        } else {
            requested.iter().map(AsRef::as_ref).collect()
        };

        let mut sort = TopoSort {
            graph,
            marks: HashMap::new(),
            stack: Vec::new(),
        };

        let mut order = Vec::new();
        for root in &roots {
            let target = graph.get(root).ok_or_else(|| GraphError::UnknownTarget {
                name: root.to_string(),
                referenced_from: None,
            })?;
            if !sort.marks.contains_key(target.name()) {
                sort.visit(target, &mut order)?;
            }
        }
        debug!("Build sequence for {:?} is {:?}", roots, order);

        if self.check_whole_graph {
            let mut rest = Vec::new();
            for name in graph.names() {
                if !sort.marks.contains_key(name) {
                    if let Some(target) = graph.get(name) {
                        sort.visit(target, &mut rest)?;
                    }
                }
            }
            debug!("Unrequested targets in order: {:?}", rest);
        }

        Ok(ExecutionPlan::new(
            order.into_iter().map(str::to_string).collect(),
        ))
    }
}

/// Compute the plan for `requested` with the default scheduler
pub fn schedule<S, R>(graph: &DependencyGraph<S>, requested: &[R]) -> GraphResult<ExecutionPlan>
where
    R: AsRef<str>,
{
    Scheduler::new().schedule(graph, requested)
}

struct TopoSort<'g, S> {
    graph: &'g DependencyGraph<S>,
    marks: HashMap<&'g str, Mark>,
    /// Targets currently being visited, outermost first
    stack: Vec<&'g str>,
}

impl<'g, S> TopoSort<'g, S> {
    fn visit(&mut self, target: &'g Target<S>, out: &mut Vec<&'g str>) -> GraphResult<()> {
        let name = target.name();
        self.marks.insert(name, Mark::Visiting);
        self.stack.push(name);

        for dep in target.dependencies() {
            match self.marks.get(dep.as_str()).copied() {
                Some(Mark::Visited) => {}
                Some(Mark::Visiting) => return Err(self.cycle_through(dep)),
                None => {
                    let dep_target =
                        self.graph
                            .get(dep)
                            .ok_or_else(|| GraphError::UnknownTarget {
                                name: dep.clone(),
                                referenced_from: Some(name.to_string()),
                            })?;
                    self.visit(dep_target, out)?;
                }
            }
        }

        self.stack.pop();
        self.marks.insert(name, Mark::Visited);
        out.push(name);
        Ok(())
    }

    /// Cycle from `dep` back to `dep`, outer to inner
    fn cycle_through(&self, dep: &str) -> GraphError {
        let start = self.stack.iter().position(|n| *n == dep).unwrap_or(0);
        let mut path: Vec<String> = self.stack[start..].iter().map(|n| n.to_string()).collect();
        path.push(dep.to_string());
        GraphError::CircularDependency { path }
    }
}
