//! Build events and listeners
//!
//! Listeners are plain functions called synchronously as targets change
//! state. They observe the run and cannot influence it.

use crate::graph::ExecutionPlan;
use crate::runner::{RunResult, RunStatus, SkipReason, TargetOutcome};
use colored::Colorize;
use std::fmt;

/// A state transition reported to listeners
#[derive(Debug)]
pub enum BuildEvent<'a> {
    BuildStarted { plan: &'a ExecutionPlan },
    TargetStarted { name: &'a str },
    /// A target that started has completed or failed
    TargetFinished { name: &'a str, outcome: &'a TargetOutcome },
    /// A target was not run
    TargetSkipped { name: &'a str, reason: &'a SkipReason },
    BuildFinished { result: &'a RunResult },
}

type Listener = Box<dyn Fn(&BuildEvent<'_>) + Send + Sync>;

/// Ordered list of subscribers
#[derive(Default)]
pub struct Listeners {
    subscribers: Vec<Listener>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&BuildEvent<'_>) + Send + Sync + 'static,
    {
        self.subscribers.push(Box::new(listener));
    }

    /// Call every subscriber in subscription order
    pub fn emit(&self, event: &BuildEvent<'_>) {
        for listener in &self.subscribers {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Verbosity levels for console output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

/// Listener printing build progress to stderr
pub fn console_listener(verbosity: Verbosity) -> impl Fn(&BuildEvent<'_>) + Send + Sync {
    move |event| match event {
        BuildEvent::BuildStarted { plan } => {
            if verbosity >= Verbosity::Verbose {
                eprintln!("Build sequence: {}", plan);
            }
        }
        BuildEvent::TargetStarted { name } => {
            if verbosity >= Verbosity::Normal {
                eprintln!("\n{}:", name.bold());
            }
        }
        BuildEvent::TargetFinished { name, outcome } => {
            if let TargetOutcome::Failed(err) = outcome {
                if verbosity >= Verbosity::Quiet {
                    eprintln!("{} {}: {}", "[FAILED]".red(), name, err);
                }
            }
        }
        BuildEvent::TargetSkipped { name, reason } => {
            if verbosity >= Verbosity::Verbose {
                eprintln!("\n{}: {}", name.bold(), format!("skipped ({})", reason).dimmed());
            }
        }
        BuildEvent::BuildFinished { result } => {
            if verbosity < Verbosity::Quiet {
                return;
            }
            match result.status() {
                RunStatus::Success => {
                    if verbosity >= Verbosity::Normal {
                        eprintln!("\n{}", "BUILD SUCCESSFUL".green().bold());
                    }
                }
                RunStatus::Failed => {
                    eprintln!("\n{}", "BUILD FAILED".red().bold());
                    if let Some(err) = result.first_error() {
                        eprintln!("{}", err);
                    }
                }
                RunStatus::Cancelled => eprintln!("\n{}", "BUILD CANCELLED".yellow().bold()),
            }
            if verbosity >= Verbosity::Normal {
                eprintln!("Total time: {:.2}s", result.elapsed().as_secs_f64());
            }
        }
    }
}
