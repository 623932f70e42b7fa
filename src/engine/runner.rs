// src/engine/runner.rs

//! Async shell around the pure scheduler.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::action::ExecutionContext;
use crate::dag::scheduler_step::{RetryDirective, SchedulerStep};
use crate::dag::task_state::ScheduledAttempt;
use crate::dag::{Scheduler, TaskGraph};
use crate::engine::report::{RunReport, RunStatus};
use crate::engine::{EngineEvent, EngineOptions};
use crate::warehouse::Warehouse;

/// Drives one run of one task graph to completion.
///
/// The engine owns all task state through the scheduler and is the only
/// writer. Workers execute actions on their own Tokio tasks and report back
/// over an mpsc channel; retry back-offs are armed as detached timers so one
/// task's wait never stalls unrelated branches.
pub struct Engine {
    scheduler: Scheduler,
    options: EngineOptions,
    context: ExecutionContext,
    semaphore: Option<Arc<Semaphore>>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("scheduler", &self.scheduler)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(graph: TaskGraph, options: EngineOptions, warehouse: Arc<dyn Warehouse>) -> Self {
        let semaphore = options
            .max_parallel_tasks
            .map(|limit| Arc::new(Semaphore::new(limit)));

        Self {
            scheduler: Scheduler::new(graph),
            options,
            context: ExecutionContext::new(warehouse, CancellationToken::new()),
            semaphore,
        }
    }

    /// Token that cancels this run cooperatively. Clone it before calling
    /// [`run`](Self::run).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.context.cancel_token().clone()
    }

    /// Execute the run to completion and produce the report.
    ///
    /// Per-task errors never escape this call; they surface as task states
    /// in the report.
    pub async fn run(mut self) -> RunReport {
        let (tx, mut rx) = mpsc::channel::<EngineEvent>(64);
        let cancel = self.cancellation_token();
        let mut in_flight = 0usize;
        let mut cancelled = false;

        info!(tasks = self.scheduler.task_count(), "engine run started");

        let step = self.scheduler.start();
        let mut finished = step.run_finished;
        self.apply_step(step, &tx, &mut in_flight);

        while !(finished && in_flight == 0) && !(cancelled && in_flight == 0) {
            // Biased: once the token fires, cancellation wins over any
            // completion that raced with it.
            tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancelled => {
                    info!("cancellation requested; draining in-flight tasks");
                    cancelled = true;
                    self.scheduler.cancel_pending();
                }
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    debug!(?event, "engine received event");

                    match event {
                        EngineEvent::AttemptFinished { task, outcome } => {
                            in_flight -= 1;
                            let step = self.scheduler.handle_attempt(&task, outcome);
                            if cancelled {
                                continue;
                            }
                            finished = step.run_finished;
                            self.apply_step(step, &tx, &mut in_flight);
                        }
                        EngineEvent::RetryDue { task } => {
                            if cancelled {
                                continue;
                            }
                            if let Some(attempt) = self.scheduler.begin_retry(&task) {
                                self.dispatch(attempt, &tx, &mut in_flight);
                            }
                        }
                    }
                }
            }
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else {
            self.scheduler
                .outcome_status(self.options.fail_run_on_skip)
        };

        info!(?status, "engine run finished");
        self.scheduler.into_report(status)
    }

    /// Execute one scheduler step: arm retry timers, dispatch new attempts.
    fn apply_step(
        &mut self,
        step: SchedulerStep,
        tx: &mpsc::Sender<EngineEvent>,
        in_flight: &mut usize,
    ) {
        for retry in step.retries {
            self.arm_retry_timer(retry, tx);
        }
        for attempt in step.newly_runnable {
            self.dispatch(attempt, tx, in_flight);
        }
    }

    /// Spawn a worker for one attempt.
    fn dispatch(
        &self,
        attempt: ScheduledAttempt,
        tx: &mpsc::Sender<EngineEvent>,
        in_flight: &mut usize,
    ) {
        *in_flight += 1;

        let tx = tx.clone();
        let ctx = self.context.clone();
        let semaphore = self.semaphore.clone();

        tokio::spawn(async move {
            let _permit = match semaphore {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };

            info!(task = %attempt.id, attempt = attempt.attempt, "starting task attempt");
            let outcome = attempt.action.run(&ctx).await;

            match &outcome {
                Ok(()) => {
                    info!(task = %attempt.id, attempt = attempt.attempt, "task attempt succeeded");
                }
                Err(err) => {
                    warn!(
                        task = %attempt.id,
                        attempt = attempt.attempt,
                        error = %err,
                        "task attempt failed"
                    );
                }
            }

            let _ = tx
                .send(EngineEvent::AttemptFinished {
                    task: attempt.id,
                    outcome,
                })
                .await;
        });
    }

    /// Arm a detached retry timer. The timer is abandoned on cancellation so
    /// a cancelled run never waits out a back-off.
    fn arm_retry_timer(&self, retry: RetryDirective, tx: &mpsc::Sender<EngineEvent>) {
        info!(
            task = %retry.task,
            delay_ms = retry.delay.as_millis() as u64,
            "waiting before retry"
        );

        let tx = tx.clone();
        let cancel = self.context.cancel_token().clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(retry.delay) => {
                    let _ = tx.send(EngineEvent::RetryDue { task: retry.task }).await;
                }
                _ = cancel.cancelled() => {}
            }
        });
    }
}
