//! Rant - a dependency-driven build target runner
//!
//! Rant reads named targets from a YAML build file, orders them by their
//! declared dependencies, and runs each target's steps once, guarded by
//! conditions over a layered property store.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod properties;
pub mod runner;

// Re-export commonly used types
pub use error::{Result, RantError};

/// Current version of Rant
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
