//! Parallel plan execution
//!
//! A ready-set scheduler over the plan: targets whose planned dependencies
//! have all finished are handed to a fixed pool of scoped worker threads.
//! The main thread owns all bookkeeping and is the only place outcomes are
//! recorded, so failure handling matches the sequential run.

use crate::error::ExecutionError;
use crate::graph::{DependencyGraph, ExecutionPlan};
use crate::properties::PropertyStore;
use crate::runner::engine::RunTracker;
use crate::runner::{BuildEvent, Engine, SkipReason, StepRunner, TargetOutcome, TargetReport};
use std::collections::{HashMap, VecDeque};
use std::sync::{mpsc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, instrument};

impl Engine {
    /// Run `plan` on `workers` threads
    ///
    /// A target starts only after every dependency in the plan has finished
    /// and allows dependents. The store is shared by reference; each `set`
    /// locks its layer for that call only.
    #[instrument(skip_all, fields(targets = plan.len(), workers))]
    pub fn run_parallel<S, R>(
        &self,
        plan: &ExecutionPlan,
        graph: &DependencyGraph<S>,
        store: &PropertyStore,
        runner: &R,
        workers: usize,
    ) -> crate::runner::RunResult
    where
        S: Sync,
        R: StepRunner<S> + Sync + ?Sized,
    {
        let started = Instant::now();
        let workers = workers.max(1);
        self.listeners.emit(&BuildEvent::BuildStarted { plan });

        let names: Vec<&str> = plan.iter().map(String::as_str).collect();
        let index: HashMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        // Planned dependencies and reverse edges, by plan position
        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
        for (i, name) in names.iter().enumerate() {
            if let Some(target) = graph.get(name) {
                for dep in target.dependencies() {
                    if let Some(&d) = index.get(dep.as_str()) {
                        deps[i].push(d);
                        dependents[d].push(i);
                    }
                }
            }
        }
        let mut waiting: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut ready: VecDeque<usize> = (0..names.len()).filter(|i| waiting[*i] == 0).collect();

        let mut outcomes: Vec<Option<TargetOutcome>> = (0..names.len()).map(|_| None).collect();
        let mut tracker = RunTracker::new(self.config.keep_going);

        let (job_tx, job_rx) = mpsc::channel::<usize>();
        let (result_tx, result_rx) = mpsc::channel::<(usize, TargetOutcome)>();
        let job_rx = Mutex::new(job_rx);

        std::thread::scope(|s| {
            for _ in 0..workers {
                let tx = result_tx.clone();
                let job_rx = &job_rx;
                let names = &names;
                s.spawn(move || loop {
                    let next = job_rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
                    let Ok(i) = next else { break };
                    let outcome = match graph.get(names[i]) {
                        Some(target) => self.run_target(target, store, runner),
                        None => TargetOutcome::Failed(ExecutionError::UnknownTarget(
                            names[i].to_string(),
                        )),
                    };
                    if tx.send((i, outcome)).is_err() {
                        break;
                    }
                });
            }
            // Workers hold the remaining senders
            drop(result_tx);

            let mut in_flight = 0usize;
            loop {
                while let Some(i) = ready.pop_front() {
                    if tracker.halted.is_some() {
                        break;
                    }
                    if self.cancel.is_cancelled() {
                        tracker.cancel();
                        break;
                    }

                    let failed_dep = deps[i].iter().find(|d| {
                        outcomes[**d]
                            .as_ref()
                            .is_some_and(|o| !o.allows_dependents())
                    });
                    match failed_dep {
                        Some(&d) => {
                            let outcome = TargetOutcome::Skipped(SkipReason::DependencyFailed(
                                names[d].to_string(),
                            ));
                            finish(self, &mut tracker, &mut outcomes, &names, i, outcome);
                            release(i, &dependents, &mut waiting, &mut ready);
                        }
                        None => {
                            debug!(target_name = names[i], "dispatching");
                            if job_tx.send(i).is_err() {
                                break;
                            }
                            in_flight += 1;
                        }
                    }
                }

                if in_flight == 0 {
                    break;
                }
                let Ok((i, outcome)) = result_rx.recv() else { break };
                in_flight -= 1;
                finish(self, &mut tracker, &mut outcomes, &names, i, outcome);
                release(i, &dependents, &mut waiting, &mut ready);
            }

            drop(job_tx);
        });

        let fallback = tracker.halted.clone().unwrap_or(SkipReason::Aborted);
        let reports = names
            .iter()
            .zip(outcomes)
            .map(|(name, outcome)| {
                let outcome = outcome.unwrap_or_else(|| {
                    let outcome = TargetOutcome::Skipped(fallback.clone());
                    self.report(name, &outcome);
                    outcome
                });
                TargetReport {
                    name: name.to_string(),
                    outcome,
                }
            })
            .collect();
        tracker.set_reports(reports);

        let result = tracker.finish(started.elapsed());
        self.listeners.emit(&BuildEvent::BuildFinished { result: &result });
        result
    }
}

/// Record the outcome of the target at plan position `i`
fn finish(
    engine: &Engine,
    tracker: &mut RunTracker,
    outcomes: &mut [Option<TargetOutcome>],
    names: &[&str],
    i: usize,
    outcome: TargetOutcome,
) {
    engine.report(names[i], &outcome);
    tracker.observe(&outcome, i);
    outcomes[i] = Some(outcome);
}

/// Count `i` as finished for its dependents
fn release(
    i: usize,
    dependents: &[Vec<usize>],
    waiting: &mut [usize],
    ready: &mut VecDeque<usize>,
) {
    for &d in &dependents[i] {
        waiting[d] -= 1;
        if waiting[d] == 0 {
            ready.push_back(d);
        }
    }
}
