//! End-to-end tests driving the rant binary

mod common;

use common::{create_build_file, create_build_file_in_subdir, rant, rant_process};
use predicates::prelude::*;
use std::process::Stdio;
use std::thread;
use std::time::{Duration, Instant};

const DEMO: &str = r#"
name: demo
default: build
properties:
  greeting: hello
targets:
  clean:
    description: Remove outputs
    steps: "echo cleaning"
  prepare:
    depends: clean
    steps:
      - echo "preparing ${greeting}"
  build:
    depends: prepare
    description: Build everything
    unless: skip
    steps:
      - echo "building for ${greeting}"
  helper:
    steps: echo helping
"#;

#[test]
fn test_default_target_runs_dependencies_in_order() {
    let (temp_dir, _) = create_build_file(DEMO);

    rant(temp_dir.path())
        .assert()
        .success()
        .stdout(
            predicate::str::is_match("cleaning\n(.|\n)*preparing hello\n(.|\n)*building for hello")
                .unwrap(),
        )
        .stderr(predicate::str::contains("BUILD SUCCESSFUL"));
}

#[test]
fn test_build_file_found_from_subdirectory() {
    let (_temp_dir, _, sub_dir) = create_build_file_in_subdir(DEMO);

    rant(&sub_dir)
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("cleaning"));
}

#[test]
fn test_command_line_property_wins() {
    let (temp_dir, _) = create_build_file(DEMO);

    rant(temp_dir.path())
        .args(["-D", "greeting=world", "build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("building for world"));
}

#[test]
fn test_unless_property_skips_target() {
    let (temp_dir, _) = create_build_file(DEMO);

    rant(temp_dir.path())
        .args(["-Dskip=1", "build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("preparing hello"))
        .stdout(predicate::str::contains("building for").not());
}

#[test]
fn test_failing_step_fails_build() {
    let (temp_dir, _) = create_build_file(
        r#"
targets:
  broken:
    steps: ["exit 7"]
  after:
    depends: broken
    steps: ["echo unreachable"]
"#,
    );

    rant(temp_dir.path())
        .arg("after")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("unreachable").not())
        .stderr(predicate::str::contains("BUILD FAILED"))
        .stderr(predicate::str::contains("broken"));
}

#[test]
fn test_guarded_targets() {
    let (temp_dir, _) = create_build_file(
        r#"
properties:
  mode: release
predicates:
  has-build-file: { exists: "build.yml" }
targets:
  package:
    guard: { not: { istrue: "${skip}" } }
    steps: ["echo packaging"]
  release:
    guard:
      and:
        - equals: { left: "${mode}", right: RELEASE, casesensitive: false }
        - predicate: has-build-file
    steps: ["echo releasing"]
  debug:
    guard: { equals: { left: "${mode}", right: debug } }
    steps: ["echo debugging"]
"#,
    );

    rant(temp_dir.path())
        .args(["package", "release", "debug"])
        .assert()
        .success()
        .stdout(predicate::str::contains("packaging"))
        .stdout(predicate::str::contains("releasing"))
        .stdout(predicate::str::contains("debugging").not());

    rant(temp_dir.path())
        .args(["-Dskip=yes", "package"])
        .assert()
        .success()
        .stdout(predicate::str::contains("packaging").not());
}

#[test]
fn test_keep_going_runs_independent_targets() {
    let (temp_dir, _) = create_build_file(
        r#"
targets:
  broken: { steps: ["exit 1"] }
  dependent: { depends: broken, steps: ["echo second-ran"] }
  independent: { steps: ["echo solo-ran"] }
"#,
    );

    rant(temp_dir.path())
        .args(["-k", "dependent", "independent"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("solo-ran"))
        .stdout(predicate::str::contains("second-ran").not());
}

#[test]
fn test_parallel_jobs() {
    let (temp_dir, _) = create_build_file(
        r#"
targets:
  init: { steps: ["echo init"] }
  a: { depends: init, steps: ["echo a"] }
  b: { depends: init, steps: ["echo b"] }
  all: { depends: [a, b], steps: ["echo all-done"] }
"#,
    );

    rant(temp_dir.path())
        .args(["-j", "2", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("all-done"));
}

#[test]
fn test_cycle_is_reported() {
    let (temp_dir, _) = create_build_file(
        r#"
targets:
  a: { depends: b }
  b: { depends: c }
  c: { depends: a }
"#,
    );

    rant(temp_dir.path())
        .arg("a")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Circular dependency: a -> b -> c -> a"));
}

#[test]
fn test_unknown_target_is_reported() {
    let (temp_dir, _) = create_build_file(DEMO);

    rant(temp_dir.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Target 'deploy' does not exist"));
}

#[test]
fn test_trailing_comma_in_depends() {
    let (temp_dir, _) = create_build_file("targets:\n  a: {}\n  b: { depends: 'a,' }\n");

    rant(temp_dir.path())
        .arg("b")
        .assert()
        .failure()
        .stderr(predicate::str::contains("'depends' of target 'b'"));
}

#[test]
fn test_list_targets() {
    let (temp_dir, _) = create_build_file(DEMO);

    rant(temp_dir.path())
        .arg("-p")
        .assert()
        .success()
        .stdout(predicate::str::contains("Main targets:"))
        .stdout(predicate::str::contains("Build everything"))
        .stdout(predicate::str::contains("Other targets:"))
        .stdout(predicate::str::contains("helper"))
        .stdout(predicate::str::contains("Default target: build"));
}

#[test]
fn test_print_properties() {
    let (temp_dir, _) = create_build_file(DEMO);

    rant(temp_dir.path())
        .args(["--properties", "-D", "extra=1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("extra=1\n"))
        .stdout(predicate::str::contains("greeting=hello\n"))
        .stdout(predicate::str::contains("rant.project.name=demo\n"));
}

#[test]
fn test_strict_mode_rejects_undefined_property() {
    let (temp_dir, _) = create_build_file(
        r#"
targets:
  a:
    steps:
      - echo '${nope}'
"#,
    );

    rant(temp_dir.path())
        .arg("a")
        .assert()
        .success()
        .stdout(predicate::str::contains("${nope}"));

    rant(temp_dir.path())
        .args(["--strict", "a"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Property 'nope' is not defined"));
}

#[test]
fn test_missing_build_file() {
    let temp_dir = tempfile::TempDir::new().unwrap();

    rant(temp_dir.path())
        .args(["-f", "nowhere.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_completions() {
    let temp_dir = tempfile::TempDir::new().unwrap();

    rant(temp_dir.path())
        .args(["--completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rant"));
}

#[cfg(unix)]
#[test]
fn test_interrupt_cancels_build() {
    let (temp_dir, _) = create_build_file(
        r#"
targets:
  slow:
    steps:
      - touch started
      - sleep 2
      - echo after-interrupt
  later:
    depends: slow
    steps: ["echo later-ran"]
"#,
    );

    let child = rant_process(temp_dir.path())
        .arg("later")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let marker = temp_dir.path().join("started");
    let deadline = Instant::now() + Duration::from_secs(10);
    while !marker.exists() {
        assert!(Instant::now() < deadline, "build never started");
        thread::sleep(Duration::from_millis(20));
    }
    thread::sleep(Duration::from_millis(200));

    let killed = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr);
    assert!(!stdout.contains("after-interrupt"));
    assert!(!stdout.contains("later-ran"));
    assert!(stderr.contains("BUILD CANCELLED"));
}
