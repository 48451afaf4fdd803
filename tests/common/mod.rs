//! Common test utilities
#![allow(dead_code)]

use assert_cmd::cargo::CommandCargoExt;
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary directory with a build.yml file
pub fn create_build_file(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let build_path = temp_dir.path().join("build.yml");
    fs::write(&build_path, content).unwrap();
    (temp_dir, build_path)
}

/// Create a build file with an empty subdirectory next to it
pub fn create_build_file_in_subdir(content: &str) -> (TempDir, PathBuf, PathBuf) {
    let (temp_dir, build_path) = create_build_file(content);
    let sub_dir = temp_dir.path().join("subdir");
    fs::create_dir(&sub_dir).unwrap();
    (temp_dir, build_path, sub_dir)
}

/// The rant binary, run from `dir` with no user properties or log filter
pub fn rant(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rant").unwrap();
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("RANT_LOG");
    cmd
}

/// Like [`rant`], as a plain process that can be spawned and signalled
pub fn rant_process(dir: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::cargo_bin("rant").unwrap();
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("RANT_LOG");
    cmd
}
