// src/dag/scheduler.rs

//! Pure scheduling core.
//!
//! The scheduler owns the immutable [`TaskGraph`] plus every task's mutable
//! run state. It is synchronous and deterministic: it consumes attempt
//! outcomes and produces [`SchedulerStep`]s describing what the async shell
//! should do next. No channels, no Tokio types, no IO — the semantics are
//! unit-testable in isolation.
//!
//! It is responsible for:
//! - deciding when a task is ready to run (all dependencies succeeded)
//! - counting attempts and applying each task's retry policy
//! - skipping dependents (transitively, immediately) when a task fails
//! - detecting when the run is finished

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::action::ExecutionError;
use crate::dag::graph::TaskGraph;
use crate::dag::scheduler_step::{RetryDirective, SchedulerStep};
use crate::dag::task_state::{RetryPolicy, ScheduledAttempt, TaskRecord, TaskState};
use crate::engine::report::{RunReport, RunStatus, TaskReport};
use crate::engine::TaskId;

#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    records: HashMap<TaskId, TaskRecord>,
}

impl Scheduler {
    pub fn new(graph: TaskGraph) -> Self {
        let records = graph
            .task_ids()
            .map(|id| (id.to_string(), TaskRecord::new()))
            .collect();
        Self { graph, records }
    }

    pub fn task_count(&self) -> usize {
        self.graph.len()
    }

    /// Current state of a task, if it exists.
    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.records.get(task).map(|r| r.state)
    }

    /// Whether nothing remains to run, retry, or wait for.
    pub fn is_settled(&self) -> bool {
        !self.records.values().any(|r| {
            matches!(r.state, TaskState::Pending | TaskState::Running) || r.awaiting_retry
        })
    }

    /// Kick off the run: mark the root set `Running` and return it.
    pub fn start(&mut self) -> SchedulerStep {
        let newly_runnable = self.collect_ready();
        SchedulerStep {
            newly_runnable,
            run_finished: self.is_settled(),
            ..SchedulerStep::default()
        }
    }

    /// Record the outcome of one finished attempt.
    pub fn handle_attempt(
        &mut self,
        task: &str,
        outcome: Result<(), ExecutionError>,
    ) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let policy = self
            .graph
            .spec(task)
            .map(|s| s.retry)
            .unwrap_or_else(RetryPolicy::default);

        let Some(record) = self.records.get_mut(task) else {
            warn!(task = %task, "attempt outcome for unknown task; ignoring");
            step.run_finished = self.is_settled();
            return step;
        };

        if record.state != TaskState::Running {
            warn!(
                task = %task,
                state = %record.state,
                "attempt outcome for task that is not running; ignoring"
            );
            step.run_finished = self.is_settled();
            return step;
        }

        match outcome {
            Ok(()) => {
                record.state = TaskState::Succeeded;
                info!(task = %task, attempts = record.attempts, "task succeeded");
                step.newly_runnable = self.collect_ready();
            }
            Err(err) => {
                record.last_error = Some(err.to_string());

                if err.is_retryable() && record.attempts <= policy.limit {
                    record.state = TaskState::Failed;
                    record.awaiting_retry = true;
                    warn!(
                        task = %task,
                        attempt = record.attempts,
                        error = %err,
                        "task failed; will retry after delay"
                    );
                    step.retries.push(RetryDirective {
                        task: task.to_string(),
                        delay: policy.delay,
                    });
                } else {
                    record.state = TaskState::Failed;
                    warn!(
                        task = %task,
                        attempts = record.attempts,
                        error = %err,
                        "task failed terminally; skipping dependents"
                    );
                    step.newly_skipped = self.mark_dependents_skipped(task);
                }
            }
        }

        step.run_finished = self.is_settled();
        step
    }

    /// Move a task out of its retry window into a fresh attempt.
    ///
    /// Returns `None` if the task is not awaiting a retry (e.g. the run was
    /// cancelled while the timer was armed).
    pub fn begin_retry(&mut self, task: &str) -> Option<ScheduledAttempt> {
        let record = self.records.get_mut(task)?;
        if !record.awaiting_retry || record.state != TaskState::Failed {
            return None;
        }

        record.awaiting_retry = false;
        record.state = TaskState::Running;
        record.attempts += 1;
        info!(task = %task, attempt = record.attempts, "retrying task");

        let spec = self.graph.spec(task)?;
        Some(ScheduledAttempt {
            id: task.to_string(),
            action: spec.action.clone(),
            attempt: record.attempts,
        })
    }

    /// Cancellation: every task that never started ends `Skipped`, and armed
    /// retries are abandoned (their tasks stay terminally `Failed`).
    pub fn cancel_pending(&mut self) -> Vec<TaskId> {
        let mut skipped = Vec::new();

        for (id, record) in self.records.iter_mut() {
            match record.state {
                TaskState::Pending => {
                    record.state = TaskState::Skipped;
                    record.last_error = Some("run cancelled before task started".to_string());
                    skipped.push(id.clone());
                }
                TaskState::Failed if record.awaiting_retry => {
                    record.awaiting_retry = false;
                }
                _ => {}
            }
        }

        if !skipped.is_empty() {
            info!(count = skipped.len(), "cancellation skipped pending tasks");
        }
        skipped
    }

    /// Overall outcome once the run has settled.
    pub fn outcome_status(&self, fail_run_on_skip: bool) -> RunStatus {
        let any_failed = self
            .records
            .values()
            .any(|r| r.state == TaskState::Failed);
        let any_skipped = self
            .records
            .values()
            .any(|r| r.state == TaskState::Skipped);

        if any_failed || (any_skipped && fail_run_on_skip) {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        }
    }

    /// Consume the scheduler into the final report, tasks in insertion order.
    pub fn into_report(self, status: RunStatus) -> RunReport {
        let mut tasks = Vec::with_capacity(self.graph.len());
        for id in self.graph.task_ids() {
            let Some(record) = self.records.get(id) else {
                continue;
            };
            tasks.push((
                id.to_string(),
                TaskReport {
                    state: record.state,
                    attempts: record.attempts,
                    error: record.last_error.clone(),
                },
            ));
        }
        RunReport { status, tasks }
    }

    /// Collect every ready task, mark it `Running`, and build its attempt.
    ///
    /// Decide first, then mutate, to keep the borrows disjoint.
    fn collect_ready(&mut self) -> Vec<ScheduledAttempt> {
        let ready = self
            .graph
            .ready_tasks(|id| self.records.get(id).map(|r| r.state));

        let mut attempts = Vec::with_capacity(ready.len());
        for id in ready {
            let Some(record) = self.records.get_mut(&id) else {
                continue;
            };
            record.state = TaskState::Running;
            record.attempts += 1;

            debug!(
                task = %id,
                attempt = record.attempts,
                "dependencies satisfied; marking Running"
            );

            let Some(spec) = self.graph.spec(&id) else {
                continue;
            };
            attempts.push(ScheduledAttempt {
                id: id.clone(),
                action: spec.action.clone(),
                attempt: record.attempts,
            });
        }
        attempts
    }

    /// Skip every pending dependent of `root`, transitively. A task is
    /// skipped as soon as any upstream predecessor fails or is skipped;
    /// sibling predecessors still running cannot change that outcome.
    fn mark_dependents_skipped(&mut self, root: &str) -> Vec<TaskId> {
        let mut stack: Vec<(TaskId, TaskId)> = self
            .graph
            .dependents_of(root)
            .iter()
            .map(|dep| (dep.clone(), root.to_string()))
            .collect();

        let mut newly_skipped = Vec::new();

        while let Some((id, cause)) = stack.pop() {
            let Some(record) = self.records.get_mut(&id) else {
                continue;
            };

            if record.state == TaskState::Pending {
                record.state = TaskState::Skipped;
                record.last_error = Some(format!("upstream task '{cause}' did not succeed"));
                debug!(task = %id, cause = %cause, "skipping task due to upstream outcome");
                newly_skipped.push(id.clone());

                stack.extend(
                    self.graph
                        .dependents_of(&id)
                        .iter()
                        .map(|dep| (dep.clone(), id.clone())),
                );
            }
        }

        newly_skipped
    }
}
