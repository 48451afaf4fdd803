//! Target execution
//!
//! This module evaluates guards, runs execution plans (sequentially or on a
//! worker pool) and executes shell steps.

pub mod cancel;
pub mod command;
pub mod condition;
pub mod engine;
pub mod events;
pub mod parallel;

// Re-export main types
pub use cancel::*;
pub use command::*;
pub use condition::*;
pub use engine::*;
pub use events::*;
