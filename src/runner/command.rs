//! Shell step execution
//!
//! Build file steps are either shell commands or property assignments.
//! Commands are expanded against the property store and run through an
//! interpreter (`sh -c` unless configured otherwise).

use crate::error::{ExecutionError, ExecutionResult};
use crate::properties::{layer, Expander, PropertyStore};
use crate::runner::{StepOutcome, StepRunner, Verbosity};
use anyhow::Context as _;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use tracing::{debug, instrument};

/// One step of a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Shell command
    Command {
        exec: String,
        /// What to echo instead of `exec`
        print: Option<String>,
        quiet: bool,
        /// Working directory, relative to the build file
        dir: Option<String>,
    },
    /// Define a property in the project layer
    SetProperty { name: String, value: String },
}

impl Step {
    /// Plain command with default options
    pub fn command(exec: impl Into<String>) -> Self {
        Step::Command {
            exec: exec.into(),
            print: None,
            quiet: false,
            dir: None,
        }
    }

    pub fn set_property(name: impl Into<String>, value: impl Into<String>) -> Self {
        Step::SetProperty {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Runs [`Step`]s as shell commands
#[derive(Debug, Clone)]
pub struct ShellRunner {
    pub working_dir: PathBuf,
    /// Interpreter and its arguments, e.g. `["bash", "-c"]`
    pub interpreter: Vec<String>,
    pub verbosity: Verbosity,
    expander: Expander,
}

impl ShellRunner {
    pub fn new() -> Self {
        ShellRunner {
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            interpreter: vec!["sh".to_string(), "-c".to_string()],
            verbosity: Verbosity::Normal,
            expander: Expander::new(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Fail steps that reference undefined properties
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.expander = self.expander.with_strict(strict);
        self
    }

    /// Run one step
    #[instrument(skip_all)]
    pub fn execute(&self, step: &Step, store: &PropertyStore) -> anyhow::Result<()> {
        match step {
            Step::SetProperty { name, value } => {
                let value = self
                    .expander
                    .expand(value, store)
                    .with_context(|| format!("expanding value of property '{}'", name))?;
                if !store.set(layer::PROJECT, name.as_str(), value.as_str())? {
                    debug!(property = name.as_str(), "already defined, not overriding");
                }
                Ok(())
            }
            Step::Command {
                exec,
                print,
                quiet,
                dir,
            } => {
                let exec = self.expander.expand(exec, store)?;

                if !quiet && self.verbosity >= Verbosity::Normal {
                    let shown = match print {
                        Some(print) => self
                            .expander
                            .expand(print, store)
                            .unwrap_or_else(|_| print.clone()),
                        None => exec.clone(),
                    };
                    eprintln!("[RUN] {}", shown);
                }

                let working_dir = match dir {
                    Some(dir) => self.working_dir.join(self.expander.expand(dir, store)?),
                    None => self.working_dir.clone(),
                };

                let mut command = self.shell(&exec, &working_dir)?;
                command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
                export_properties(&mut command, store);

                debug!(command = exec.as_str(), dir = %working_dir.display(), "spawning");
                let status = command.status().map_err(|e| ExecutionError::Spawn {
                    command: exec.clone(),
                    error: e.to_string(),
                })?;

                if !status.success() {
                    return Err(ExecutionError::CommandFailed(status.code()).into());
                }
                Ok(())
            }
        }
    }

    /// Whether `cmd` exits successfully, with output suppressed
    pub fn check_command(&self, cmd: &str, store: &PropertyStore) -> ExecutionResult<bool> {
        let exec = self.expander.expand(cmd, store).map_err(|e| ExecutionError::Spawn {
            command: cmd.to_string(),
            error: e.to_string(),
        })?;

        let mut command = self.shell(&exec, &self.working_dir)?;
        command.stdout(Stdio::null()).stderr(Stdio::null());
        export_properties(&mut command, store);

        let status = command.status().map_err(|e| ExecutionError::Spawn {
            command: exec,
            error: e.to_string(),
        })?;
        Ok(status.success())
    }

    fn shell(&self, exec: &str, working_dir: &Path) -> ExecutionResult<StdCommand> {
        let (program, args) = self
            .interpreter
            .split_first()
            .ok_or_else(|| ExecutionError::Spawn {
                command: exec.to_string(),
                error: "no interpreter configured".to_string(),
            })?;

        let mut command = StdCommand::new(program);
        command.args(args).arg(exec).current_dir(working_dir);
        Ok(command)
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl StepRunner<Step> for ShellRunner {
    fn run_step(&self, step: &Step, store: &PropertyStore) -> StepOutcome {
        self.execute(step, store).into()
    }
}

/// Environment variable name for a property key
///
/// Characters outside `[A-Za-z0-9_]` become `_`.
pub fn env_name(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn export_properties(command: &mut StdCommand, store: &PropertyStore) {
    for (key, value) in store.snapshot() {
        command.env(env_name(&key), value);
    }
}
