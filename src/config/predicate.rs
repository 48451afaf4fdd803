//! Named predicates declared in the build file

use crate::config::types::{BuildFile, PredicateConfig};
use crate::error::{ConfigError, ConfigResult};
use crate::properties::{Expander, PropertyStore};
use crate::runner::{Predicates, ShellRunner};
use regex::{Regex, RegexBuilder};
use std::env;
use std::path::{Path, PathBuf};

/// Compile the `matches` pattern of a predicate, if it has one
pub fn compile_pattern(id: &str, predicate: &PredicateConfig) -> ConfigResult<Option<Regex>> {
    predicate
        .matches
        .as_ref()
        .map(|matches| {
            RegexBuilder::new(&matches.pattern)
                .case_insensitive(!matches.casesensitive)
                .build()
                .map_err(|source| ConfigError::InvalidPattern {
                    predicate: id.to_string(),
                    source,
                })
        })
        .transpose()
}

/// Register every predicate of `file`
///
/// Commands run through `runner`; `exists` patterns are relative to
/// `base_dir`. Operands are expanded when the predicate is evaluated.
/// Expects a file that passed [`validate_predicates`](crate::config::validate_predicates).
pub fn build_predicates(
    file: &BuildFile,
    base_dir: &Path,
    runner: &ShellRunner,
    expander: Expander,
) -> ConfigResult<Predicates> {
    let mut predicates = Predicates::new();

    for (id, config) in &file.predicates {
        if let Some(command) = &config.command {
            let command = command.clone();
            let runner = runner.clone();
            predicates.register(id.clone(), move |store: &PropertyStore| {
                Ok(runner.check_command(&command, store)?)
            });
        } else if let Some(pattern) = &config.exists {
            let pattern = pattern.clone();
            let base_dir = base_dir.to_path_buf();
            predicates.register(id.clone(), move |store: &PropertyStore| {
                path_exists(&base_dir, &expander.expand(&pattern, store)?)
            });
        } else if let Some(name) = &config.env_set {
            let name = name.clone();
            predicates.register(id.clone(), move |store: &PropertyStore| {
                Ok(env::var_os(expander.expand(&name, store)?).is_some())
            });
        } else if let (Some(matches), Some(regex)) =
            (&config.matches, compile_pattern(id, config)?)
        {
            let string = matches.string.clone();
            predicates.register(id.clone(), move |store: &PropertyStore| {
                Ok(regex.is_match(&expander.expand(&string, store)?))
            });
        }
    }

    Ok(predicates)
}

/// Whether the glob `pattern` matches at least one existing path
fn path_exists(base_dir: &Path, pattern: &str) -> anyhow::Result<bool> {
    let full: PathBuf = base_dir.join(pattern);
    let mut paths = glob::glob(&full.to_string_lossy())?;
    Ok(paths.any(|entry| entry.is_ok()))
}
