//! Build file validation
//!
//! Checks that can be made before anything runs: predicate definitions,
//! guard references, the default target and the shape of the whole graph.

use crate::config::parse::build_graph;
use crate::config::predicate::compile_pattern;
use crate::config::types::BuildFile;
use crate::error::{ConfigError, ConfigResult, RantError};
use crate::graph::Scheduler;

/// Validate a complete build file
pub fn validate_build_file(file: &BuildFile) -> Result<(), RantError> {
    validate_predicates(file)?;

    for (name, target) in &file.targets {
        if let Some(guard) = target.condition() {
            for id in guard.external_ids() {
                if file.predicate(id).is_none() {
                    return Err(ConfigError::UnknownPredicate {
                        target: name.clone(),
                        predicate: id.to_string(),
                    }
                    .into());
                }
            }
        }
    }

    if let Some(default) = &file.default {
        if file.target(default).is_none() {
            return Err(ConfigError::DefaultTargetMissing(default.clone()).into());
        }
    }

    let graph = build_graph(file)?;
    let graph = graph.resolve()?;
    // Cycles anywhere in the graph
    if let Some(first) = graph.names().next() {
        Scheduler::new()
            .check_whole_graph(true)
            .schedule(&graph, &[first])?;
    }

    Ok(())
}

/// Each predicate defines exactly one check and its pattern compiles
pub fn validate_predicates(file: &BuildFile) -> ConfigResult<()> {
    for (id, predicate) in &file.predicates {
        if predicate.check_count() != 1 {
            return Err(ConfigError::AmbiguousPredicate(id.clone()));
        }
        compile_pattern(id, predicate)?;
    }
    Ok(())
}
