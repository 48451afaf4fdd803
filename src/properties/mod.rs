//! Build properties
//!
//! This module holds the layered property store and the `${name}` expander.

pub mod expand;
pub mod store;

// Re-export main types
pub use expand::{expand, expand_strict, Expander};
pub use store::{layer, PropertyStore, STANDARD_LAYERS};
