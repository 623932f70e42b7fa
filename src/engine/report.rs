// src/engine/report.rs

//! Final per-task outcome summary for one orchestration run.

use crate::dag::task_state::TaskState;
use crate::engine::TaskId;

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Final record for one task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub state: TaskState,
    /// Number of times the action was invoked.
    pub attempts: u32,
    /// Last error message, for tasks that did not succeed.
    pub error: Option<String>,
}

/// Produced once, when the run completes; read-only afterwards.
///
/// Tasks appear in graph insertion order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub tasks: Vec<(TaskId, TaskReport)>,
}

impl RunReport {
    pub fn task(&self, id: &str) -> Option<&TaskReport> {
        self.tasks
            .iter()
            .find(|(task_id, _)| task_id == id)
            .map(|(_, report)| report)
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}
