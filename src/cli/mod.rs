//! CLI interface and argument parsing
//!
//! This module handles command-line interface parsing, logging setup,
//! Ctrl-C cancellation, target listing and shell completion.

pub mod app;
pub mod interrupt;
pub mod logging;

// Re-export main types
pub use app::*;
