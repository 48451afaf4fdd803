//! Error types for Rant

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Rant operations
pub type Result<T> = std::result::Result<T, RantError>;

/// Main error type for Rant
#[derive(Error, Debug)]
pub enum RantError {
    /// Build file errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Property store errors
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    /// Property expansion errors
    #[error("Expansion error: {0}")]
    Expansion(#[from] ExpansionError),

    /// Guard evaluation errors
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    /// Graph construction and scheduling errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Target execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Build file parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find build file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Syntax error in '{attribute}' of target '{target}': {message}")]
    Syntax {
        target: String,
        attribute: String,
        message: String,
    },

    #[error("Predicate '{predicate}' used by target '{target}' is not defined")]
    UnknownPredicate { target: String, predicate: String },

    #[error("Invalid pattern in predicate '{predicate}': {source}")]
    InvalidPattern {
        predicate: String,
        #[source]
        source: regex::Error,
    },

    #[error("Predicate '{0}' must define exactly one check")]
    AmbiguousPredicate(String),

    #[error("Default target '{0}' is not defined")]
    DefaultTargetMissing(String),

    #[error("Failed to load property file '{path}': {error}")]
    PropertyFile { path: PathBuf, error: String },

    #[error("Invalid property definition '{0}' (expected NAME=VALUE)")]
    PropertyDefinition(String),
}

/// Property store errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PropertyError {
    #[error("Layer {index} does not exist (store has {layers} layers)")]
    NoSuchLayer { index: usize, layers: usize },
}

/// Property expansion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpansionError {
    #[error("Property '{0}' is defined in terms of itself")]
    Circular(String),

    #[error("Property '{0}' is not defined")]
    Undefined(String),

    #[error("Unterminated property reference in '{0}'")]
    Unterminated(String),
}

/// Condition evaluation errors
#[derive(Error, Debug)]
pub enum ConditionError {
    #[error("Predicate '{predicate}' failed: {source}")]
    Predicate {
        predicate: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Availability check for '{reference}' failed: {source}")]
    Availability {
        reference: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Predicate '{0}' is not registered")]
    UnknownPredicate(String),

    #[error(transparent)]
    Expansion(#[from] ExpansionError),
}

/// Dependency graph and scheduling errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate target '{0}'")]
    DuplicateTarget(String),

    #[error("Target '{name}' does not exist{}", used_from(.referenced_from))]
    UnknownTarget {
        name: String,
        referenced_from: Option<String>,
    },

    #[error("Circular dependency: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("No target requested and no default target is set")]
    NoTargetRequested,
}

fn used_from(referenced_from: &Option<String>) -> String {
    match referenced_from {
        Some(parent) => format!(". It is used from target '{}'", parent),
        None => String::new(),
    }
}

/// Target execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Target '{target}' failed at step {step}: {source}")]
    StepFailed {
        target: String,
        step: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Guard of target '{target}' could not be evaluated: {source}")]
    Guard {
        target: String,
        #[source]
        source: ConditionError,
    },

    #[error("Build cancelled while running target '{0}'")]
    Cancelled(String),

    #[error("Planned target '{0}' is not in the graph")]
    UnknownTarget(String),

    #[error("Command failed with exit code {0:?}")]
    CommandFailed(Option<i32>),

    #[error("Failed to start command '{command}': {error}")]
    Spawn { command: String, error: String },
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for property store operations
pub type PropertyResult<T> = std::result::Result<T, PropertyError>;

/// Specialized result type for expansion operations
pub type ExpansionResult<T> = std::result::Result<T, ExpansionError>;

/// Specialized result type for condition evaluation
pub type ConditionResult<T> = std::result::Result<T, ConditionError>;

/// Specialized result type for graph operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Whether an execution error came from cancellation rather than a failure
pub fn is_cancellation(err: &ExecutionError) -> bool {
    matches!(err, ExecutionError::Cancelled(_))
}
