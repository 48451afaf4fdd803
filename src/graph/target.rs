//! Build targets

use crate::runner::Condition;

/// A named unit of build work
///
/// A target is immutable once built; the graph takes ownership of it on
/// registration. `S` is the caller's step type and is opaque to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Target<S> {
    name: String,
    dependencies: Vec<String>,
    guard: Option<Condition>,
    steps: Vec<S>,
    description: Option<String>,
}

impl<S> Target<S> {
    /// Create a target with no dependencies, guard or steps
    pub fn new(name: impl Into<String>) -> Self {
        Target {
            name: name.into(),
            dependencies: Vec::new(),
            guard: None,
            steps: Vec::new(),
            description: None,
        }
    }

    pub fn with_dependencies<I, D>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_guard(mut self, guard: Condition) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_steps(mut self, steps: Vec<S>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dependency names in declared order
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Guard condition; `None` means always enabled
    pub fn guard(&self) -> Option<&Condition> {
        self.guard.as_ref()
    }

    pub fn steps(&self) -> &[S] {
        &self.steps
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
