// src/dag/task_state.rs

//! Task state machine and runtime records.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::action::TaskAction;
use crate::engine::TaskId;

/// State of a task within the run.
///
/// Transitions only move forward: `Pending -> Running -> {Succeeded, Failed}`
/// and `Pending -> Skipped`. A retryable `Failed` loops back to `Running`
/// while attempts remain; that loop is bounded by the task's retry limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Skipped
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Bounded retry policy: up to `limit` retries after the first failure, with
/// a fixed `delay` between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub limit: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // Matches the engine-level config defaults: 3 retries, 5 minutes.
        Self {
            limit: 3,
            delay: Duration::from_secs(300),
        }
    }
}

/// Static description of a task fed into the graph builder: its id, its
/// action payload, and its retry policy.
#[derive(Clone)]
pub struct TaskSpec {
    pub id: TaskId,
    pub action: Arc<dyn TaskAction>,
    pub retry: RetryPolicy,
}

impl TaskSpec {
    pub fn new(id: impl Into<TaskId>, action: Arc<dyn TaskAction>) -> Self {
        Self {
            id: id.into(),
            action,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("id", &self.id)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Mutable per-run record for one task, owned by the scheduler.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub state: TaskState,
    pub attempts: u32,
    /// Set while the task sits in the retry back-off window.
    pub awaiting_retry: bool,
    pub last_error: Option<String>,
}

impl TaskRecord {
    pub fn new() -> Self {
        Self {
            state: TaskState::Pending,
            attempts: 0,
            awaiting_retry: false,
            last_error: None,
        }
    }
}

impl Default for TaskRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// One attempt of one task, handed to a worker for execution.
#[derive(Clone)]
pub struct ScheduledAttempt {
    pub id: TaskId,
    pub action: Arc<dyn TaskAction>,
    /// 1-based attempt counter.
    pub attempt: u32,
}

impl fmt::Debug for ScheduledAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledAttempt")
            .field("id", &self.id)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}
