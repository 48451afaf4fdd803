//! Build file parsing, discovery and property loading

use crate::config::types::{BuildFile, Depends};
use crate::error::{ConfigError, ConfigResult, RantError};
use crate::graph::{DependencyGraph, Target};
use crate::properties::{layer, PropertyStore};
use crate::runner::Step;
use directories::ProjectDirs;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default build file names to search for
const BUILD_FILE_NAMES: &[&str] = &["build.yml", "build.yaml"];

/// Name of the per-user property file in the platform config directory
const USER_PROPERTIES_FILE: &str = "rant.properties";

/// A parsed build file and where it was found
#[derive(Debug, Clone)]
pub struct Project {
    pub file: BuildFile,
    pub path: PathBuf,
}

impl Project {
    /// Directory relative paths in the build file resolve against
    pub fn base_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Target graph described by the build file
    pub fn graph(&self) -> Result<DependencyGraph<Step>, RantError> {
        build_graph(&self.file)
    }
}

/// Find the build file by searching current and parent directories
pub fn find_build_file() -> ConfigResult<PathBuf> {
    find_build_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the build file starting from a specific directory
pub fn find_build_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in BUILD_FILE_NAMES {
            let path = current_dir.join(file_name);
            searched_paths.push(path.display().to_string());

            if path.is_file() {
                return Ok(path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a build file from a path
pub fn parse_build_file(path: &Path) -> Result<BuildFile, RantError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    parse_build(&contents)
}

/// Parse a build file from a string
pub fn parse_build(yaml: &str) -> Result<BuildFile, RantError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Load `path`, or discover the build file when it is `None`
pub fn load_project(path: Option<&Path>) -> Result<Project, RantError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => find_build_file()?,
    };
    debug!(path = %path.display(), "loading build file");
    let file = parse_build_file(&path)?;
    Ok(Project { file, path })
}

/// Dependency names from a `depends` value
///
/// The string form is comma separated; whitespace around names is ignored,
/// but empty names (including a trailing comma) are rejected.
pub fn split_depends(target: &str, depends: &Depends) -> ConfigResult<Vec<String>> {
    let syntax = |message: &str| ConfigError::Syntax {
        target: target.to_string(),
        attribute: "depends".to_string(),
        message: message.to_string(),
    };

    match depends {
        Depends::List(names) => names
            .iter()
            .map(|name| match name.trim() {
                "" => Err(syntax("empty target name in list")),
                name => Ok(name.to_string()),
            })
            .collect(),
        Depends::Text(text) if text.trim().is_empty() => Ok(Vec::new()),
        Depends::Text(text) => {
            if text.trim_end().ends_with(',') {
                return Err(syntax("ends with ','"));
            }
            text.split(',')
                .map(|name| match name.trim() {
                    "" => Err(syntax("empty target name between ','")),
                    name => Ok(name.to_string()),
                })
                .collect()
        }
    }
}

/// Build the target graph from a parsed build file
pub fn build_graph(file: &BuildFile) -> Result<DependencyGraph<Step>, RantError> {
    let mut graph = DependencyGraph::new();

    for (name, config) in &file.targets {
        let dependencies = match &config.depends {
            Some(depends) => split_depends(name, depends)?,
            None => Vec::new(),
        };

        let mut target = Target::new(name.clone())
            .with_dependencies(dependencies)
            .with_steps(config.steps.iter().map(|s| s.to_step()).collect());
        if let Some(guard) = config.condition() {
            target = target.with_guard(guard);
        }
        if let Some(description) = &config.description {
            target = target.with_description(description.clone());
        }
        graph.add(target)?;
    }

    if let Some(default) = &file.default {
        graph.set_default_target(default.clone());
    }

    Ok(graph)
}

/// Parse a `NAME=VALUE` definition from the command line
pub fn parse_definition(definition: &str) -> ConfigResult<(String, String)> {
    match definition.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::PropertyDefinition(definition.to_string())),
    }
}

/// Read a dotenv-style property file
pub fn load_property_file(path: &Path) -> ConfigResult<Vec<(String, String)>> {
    let property_file_error = |error: String| ConfigError::PropertyFile {
        path: path.to_path_buf(),
        error,
    };

    dotenvy::from_path_iter(path)
        .map_err(|e| property_file_error(e.to_string()))?
        .map(|item| item.map_err(|e| property_file_error(e.to_string())))
        .collect()
}

/// Location of the per-user property file
pub fn user_properties_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rant").map(|dirs| dirs.config_dir().join(USER_PROPERTIES_FILE))
}

/// Fill every layer of `store` for `project`
///
/// `definitions` are the command-line properties. Within a layer the first
/// definition wins, so the order of loading only matters inside a layer.
pub fn populate_store(
    project: &Project,
    definitions: &[(String, String)],
    store: &PropertyStore,
) -> Result<(), RantError> {
    for (name, value) in definitions {
        store.set(layer::COMMAND_LINE, name.as_str(), value.as_str())?;
    }

    let base_dir = project.base_dir();
    let base = fs::canonicalize(&base_dir).unwrap_or_else(|_| base_dir.clone());
    store.set(layer::PROJECT, "basedir", base.display().to_string())?;
    store.set(layer::PROJECT, "rant.file", project.path.display().to_string())?;
    if let Some(name) = &project.file.name {
        store.set(layer::PROJECT, "rant.project.name", name.as_str())?;
    }
    for (name, value) in &project.file.properties {
        store.set(layer::PROJECT, name.as_str(), value.as_str())?;
    }

    for file in &project.file.property_files {
        let path = base_dir.join(file);
        if !path.is_file() {
            warn!(path = %path.display(), "property file not found, skipping");
            continue;
        }
        for (name, value) in load_property_file(&path)? {
            store.set(layer::FILE, name, value)?;
        }
    }

    if let Some(path) = user_properties_file().filter(|p| p.is_file()) {
        debug!(path = %path.display(), "loading user properties");
        for (name, value) in load_property_file(&path)? {
            store.set(layer::USER, name, value)?;
        }
    }

    if let Some(prefix) = &project.file.environment {
        for (key, value) in env::vars_os() {
            if let (Some(key), Some(value)) = (key.to_str(), value.to_str()) {
                store.set(layer::ENVIRONMENT, format!("{}.{}", prefix, key), value)?;
            }
        }
    }

    Ok(())
}
