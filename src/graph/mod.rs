//! Target graph
//!
//! This module holds targets, the graph that owns them, and the scheduler
//! that turns a request into an execution plan.

pub mod dependency;
pub mod schedule;
pub mod target;

// Re-export main types
pub use dependency::{DependencyGraph, ResolvedGraph};
pub use schedule::{schedule, ExecutionPlan, Scheduler};
pub use target::Target;
