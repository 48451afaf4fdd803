//! Build file parsing and validation
//!
//! This module handles parsing of build.yml files, loading the property
//! layers they describe, and validation of their structure.

pub mod parse;
pub mod predicate;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use predicate::*;
pub use schema::*;
pub use types::*;
