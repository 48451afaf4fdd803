//! Target dependency graph
//!
//! Targets are stored in an arena keyed by name. Dependencies are plain
//! names, so a graph may reference targets that are registered later;
//! [`DependencyGraph::resolve`] checks that every reference has landed.

use crate::error::{GraphError, GraphResult};
use crate::graph::Target;
use crate::runner::Condition;
use std::collections::HashMap;
use std::ops::Deref;

/// Set of targets keyed by unique name
#[derive(Debug, Clone)]
pub struct DependencyGraph<S> {
    targets: HashMap<String, Target<S>>,
    /// Registration order
    order: Vec<String>,
    default_target: Option<String>,
}

impl<S> DependencyGraph<S> {
    pub fn new() -> Self {
        DependencyGraph {
            targets: HashMap::new(),
            order: Vec::new(),
            default_target: None,
        }
    }

    /// Register a target from its parts
    pub fn add_target<I, D>(
        &mut self,
        name: impl Into<String>,
        dependencies: I,
        guard: Option<Condition>,
        steps: Vec<S>,
    ) -> GraphResult<()>
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        let mut target = Target::new(name)
            .with_dependencies(dependencies)
            .with_steps(steps);
        if let Some(guard) = guard {
            target = target.with_guard(guard);
        }
        self.add(target)
    }

    /// Register a built target
    pub fn add(&mut self, target: Target<S>) -> GraphResult<()> {
        if self.targets.contains_key(target.name()) {
            return Err(GraphError::DuplicateTarget(target.name().to_string()));
        }
        self.order.push(target.name().to_string());
        self.targets.insert(target.name().to_string(), target);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Target<S>> {
        self.targets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Target names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Targets in registration order
    pub fn targets(&self) -> impl Iterator<Item = &Target<S>> {
        self.order.iter().filter_map(|name| self.targets.get(name))
    }

    /// Target used when a request names none
    pub fn set_default_target(&mut self, name: impl Into<String>) {
        self.default_target = Some(name.into());
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref()
    }

    /// Check that every dependency names a registered target
    pub fn resolve(&self) -> GraphResult<ResolvedGraph<'_, S>> {
        for target in self.targets() {
            if let Some(dep) = target
                .dependencies()
                .iter()
                .find(|dep| !self.targets.contains_key(dep.as_str()))
            {
                return Err(GraphError::UnknownTarget {
                    name: dep.clone(),
                    referenced_from: Some(target.name().to_string()),
                });
            }
        }

        Ok(ResolvedGraph { graph: self })
    }
}

impl<S> Default for DependencyGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// A graph whose dependency names all resolve
#[derive(Debug)]
pub struct ResolvedGraph<'g, S> {
    graph: &'g DependencyGraph<S>,
}

impl<'g, S> ResolvedGraph<'g, S> {
    pub fn graph(&self) -> &'g DependencyGraph<S> {
        self.graph
    }
}

impl<S> Deref for ResolvedGraph<'_, S> {
    type Target = DependencyGraph<S>;

    fn deref(&self) -> &Self::Target {
        self.graph
    }
}
