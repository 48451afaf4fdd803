//! Plan execution
//!
//! The engine walks an [`ExecutionPlan`] one target at a time. For each
//! target it evaluates the guard, then hands every step to the caller's
//! [`StepRunner`] in declared order. Targets only talk to each other through
//! property writes on the shared [`PropertyStore`].

use crate::error::{is_cancellation, ExecutionError};
use crate::graph::{DependencyGraph, ExecutionPlan, Target};
use crate::properties::{Expander, PropertyStore};
use crate::runner::{
    evaluate, BuildEvent, CancellationToken, ConditionContext, Listeners, PredicateResolver,
    Predicates,
};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Result of running one step
#[derive(Debug)]
pub enum StepOutcome {
    Success,
    Failure(anyhow::Error),
    /// The step decided not to do anything; the target carries on
    Skipped,
}

impl From<anyhow::Result<()>> for StepOutcome {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => StepOutcome::Success,
            Err(err) => StepOutcome::Failure(err),
        }
    }
}

/// Executes the caller's steps
///
/// Steps may write properties through `store`.
pub trait StepRunner<S> {
    fn run_step(&self, step: &S, store: &PropertyStore) -> StepOutcome;
}

impl<S, F> StepRunner<S> for F
where
    F: Fn(&S, &PropertyStore) -> StepOutcome,
{
    fn run_step(&self, step: &S, store: &PropertyStore) -> StepOutcome {
        self(step, store)
    }
}

/// Lifecycle of a target within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    NotStarted,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Why a target did not run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The guard evaluated to false
    GuardFalse,
    /// A dependency failed or was itself skipped because of a failure
    DependencyFailed(String),
    /// An earlier target failed and the build stopped
    Aborted,
    /// The build was cancelled before the target started
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::GuardFalse => write!(f, "condition not met"),
            SkipReason::DependencyFailed(dep) => {
                write!(f, "dependency '{}' failed or was not executed", dep)
            }
            SkipReason::Aborted => write!(f, "build stopped after a failure"),
            SkipReason::Cancelled => write!(f, "build cancelled"),
        }
    }
}

/// Final outcome of a target
#[derive(Debug)]
pub enum TargetOutcome {
    Completed,
    Skipped(SkipReason),
    Failed(ExecutionError),
}

impl TargetOutcome {
    pub fn state(&self) -> TargetState {
        match self {
            TargetOutcome::Completed => TargetState::Completed,
            TargetOutcome::Skipped(_) => TargetState::Skipped,
            TargetOutcome::Failed(_) => TargetState::Failed,
        }
    }

    /// Whether dependents may run after this outcome
    ///
    /// A target skipped by its own guard counts as done.
    pub fn allows_dependents(&self) -> bool {
        matches!(
            self,
            TargetOutcome::Completed | TargetOutcome::Skipped(SkipReason::GuardFalse)
        )
    }
}

/// Outcome of one planned target
#[derive(Debug)]
pub struct TargetReport {
    pub name: String,
    pub outcome: TargetOutcome,
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Process exit code for this status
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::Cancelled => 2,
        }
    }
}

/// Per-target outcomes of a run, in plan order
#[derive(Debug)]
pub struct RunResult {
    reports: Vec<TargetReport>,
    status: RunStatus,
    first_failure: Option<usize>,
    elapsed: Duration,
}

impl RunResult {
    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    pub fn reports(&self) -> &[TargetReport] {
        &self.reports
    }

    pub fn outcome(&self, name: &str) -> Option<&TargetOutcome> {
        self.reports
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.outcome)
    }

    /// State of `name`; targets outside the plan never started
    pub fn state(&self, name: &str) -> TargetState {
        self.outcome(name)
            .map(TargetOutcome::state)
            .unwrap_or(TargetState::NotStarted)
    }

    /// Names of the targets that completed, in plan order
    pub fn completed(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, TargetOutcome::Completed))
            .map(|r| r.name.as_str())
            .collect()
    }

    /// The first failure observed during the run
    pub fn first_error(&self) -> Option<&ExecutionError> {
        self.first_failure
            .and_then(|i| self.reports.get(i))
            .and_then(|r| match &r.outcome {
                TargetOutcome::Failed(err) => Some(err),
                _ => None,
            })
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Execution policy
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EngineConfig {
    /// Keep running independent targets after a failure
    pub keep_going: bool,
    /// Undefined properties in guards are errors
    pub strict: bool,
}

/// Runs execution plans
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) resolver: Box<dyn PredicateResolver>,
    pub(crate) listeners: Listeners,
    pub(crate) cancel: CancellationToken,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            config: EngineConfig::default(),
            resolver: Box::new(Predicates::new()),
            listeners: Listeners::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.config.keep_going = keep_going;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    /// Resolver for `Available` and `External` guard nodes
    pub fn with_resolver(mut self, resolver: impl PredicateResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels runs of this engine
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&BuildEvent<'_>) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener);
    }

    /// Run `plan` sequentially on the calling thread
    #[instrument(skip_all, fields(targets = plan.len(), keep_going = self.config.keep_going))]
    pub fn run<S, R>(
        &self,
        plan: &ExecutionPlan,
        graph: &DependencyGraph<S>,
        store: &PropertyStore,
        runner: &R,
    ) -> RunResult
    where
        R: StepRunner<S> + ?Sized,
    {
        let started = Instant::now();
        self.listeners.emit(&BuildEvent::BuildStarted { plan });

        let mut tracker = RunTracker::new(self.config.keep_going);
        // Targets whose failure must keep their dependents from running
        let mut blocked: HashSet<&str> = HashSet::new();

        for name in plan {
            let outcome = if let Some(reason) = tracker.halted.clone() {
                TargetOutcome::Skipped(reason)
            } else if self.cancel.is_cancelled() {
                tracker.cancel();
                TargetOutcome::Skipped(SkipReason::Cancelled)
            } else {
                match graph.get(name) {
                    None => TargetOutcome::Failed(ExecutionError::UnknownTarget(name.clone())),
                    Some(target) => match target
                        .dependencies()
                        .iter()
                        .find(|dep| blocked.contains(dep.as_str()))
                    {
                        Some(dep) => {
                            TargetOutcome::Skipped(SkipReason::DependencyFailed(dep.clone()))
                        }
                        None => self.run_target(target, store, runner),
                    },
                }
            };

            if !outcome.allows_dependents() {
                blocked.insert(name.as_str());
            }
            self.report(name, &outcome);
            tracker.record(name.clone(), outcome);
        }

        let result = tracker.finish(started.elapsed());
        self.listeners.emit(&BuildEvent::BuildFinished { result: &result });
        result
    }

    /// Evaluate the guard and run the steps of one target
    pub(crate) fn run_target<S, R>(
        &self,
        target: &Target<S>,
        store: &PropertyStore,
        runner: &R,
    ) -> TargetOutcome
    where
        R: StepRunner<S> + ?Sized,
    {
        let name = target.name();

        if let Some(guard) = target.guard() {
            let ctx = ConditionContext::new(store, &*self.resolver)
                .with_expander(Expander::new().with_strict(self.config.strict));
            match evaluate(guard, &ctx) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(target_name = name, guard = %guard, "guard is false");
                    return TargetOutcome::Skipped(SkipReason::GuardFalse);
                }
                Err(source) => {
                    return TargetOutcome::Failed(ExecutionError::Guard {
                        target: name.to_string(),
                        source,
                    })
                }
            }
        }

        self.listeners.emit(&BuildEvent::TargetStarted { name });
        info!(target_name = name, steps = target.steps().len(), "running target");

        for (index, step) in target.steps().iter().enumerate() {
            if self.cancel.is_cancelled() {
                return TargetOutcome::Failed(ExecutionError::Cancelled(name.to_string()));
            }
            match runner.run_step(step, store) {
                StepOutcome::Success => {}
                StepOutcome::Skipped => {
                    debug!(target_name = name, step = index + 1, "step skipped")
                }
                StepOutcome::Failure(source) => {
                    return TargetOutcome::Failed(ExecutionError::StepFailed {
                        target: name.to_string(),
                        step: index + 1,
                        source,
                    })
                }
            }
        }

        TargetOutcome::Completed
    }

    /// Tell listeners how a target ended
    pub(crate) fn report(&self, name: &str, outcome: &TargetOutcome) {
        match outcome {
            TargetOutcome::Skipped(reason) => {
                debug!(target_name = name, %reason, "target skipped");
                self.listeners.emit(&BuildEvent::TargetSkipped { name, reason });
            }
            TargetOutcome::Failed(err) => {
                warn!(target_name = name, error = %err, "target failed");
                self.listeners.emit(&BuildEvent::TargetFinished { name, outcome });
            }
            TargetOutcome::Completed => {
                self.listeners.emit(&BuildEvent::TargetFinished { name, outcome });
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("listeners", &self.listeners)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Accumulates outcomes and the overall status of a run
pub(crate) struct RunTracker {
    keep_going: bool,
    reports: Vec<TargetReport>,
    status: RunStatus,
    first_failure: Option<usize>,
    /// Set once no further target may start
    pub(crate) halted: Option<SkipReason>,
}

impl RunTracker {
    pub(crate) fn new(keep_going: bool) -> Self {
        RunTracker {
            keep_going,
            reports: Vec::new(),
            status: RunStatus::Success,
            first_failure: None,
            halted: None,
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.status = RunStatus::Cancelled;
        self.halted = Some(SkipReason::Cancelled);
    }

    /// Apply the failure policy for `outcome`
    pub(crate) fn observe(&mut self, outcome: &TargetOutcome, index: usize) {
        if let TargetOutcome::Failed(err) = outcome {
            if self.first_failure.is_none() {
                self.first_failure = Some(index);
            }
            if is_cancellation(err) {
                self.cancel();
            } else {
                if self.status == RunStatus::Success {
                    self.status = RunStatus::Failed;
                }
                if !self.keep_going && self.halted.is_none() {
                    self.halted = Some(SkipReason::Aborted);
                }
            }
        }
    }

    pub(crate) fn record(&mut self, name: String, outcome: TargetOutcome) {
        let index = self.reports.len();
        self.observe(&outcome, index);
        self.reports.push(TargetReport { name, outcome });
    }

    /// Install outcomes collected out of order, indexed by plan position
    pub(crate) fn set_reports(&mut self, reports: Vec<TargetReport>) {
        self.reports = reports;
    }

    pub(crate) fn finish(self, elapsed: Duration) -> RunResult {
        RunResult {
            reports: self.reports,
            status: self.status,
            first_failure: self.first_failure,
            elapsed,
        }
    }
}
