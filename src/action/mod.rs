// src/action/mod.rs

//! Task actions: the units of work the engine dispatches.
//!
//! The engine talks to a [`TaskAction`] instead of concrete SQL operators.
//! This keeps the scheduler free of warehouse knowledge and makes it easy to
//! swap in scripted actions in tests.
//!
//! - [`stage`] bulk-loads object-store data into a staging table.
//! - [`dimension`] loads a dimension table in replace or append mode.
//! - [`fact`] appends rows into a fact table.
//! - [`quality`] runs scalar data-quality checks.
//! - [`sql`] executes an ordered list of SQL statements.
//! - [`noop`] succeeds immediately (run boundary markers).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::warehouse::{Warehouse, WarehouseError};

pub mod dimension;
pub mod fact;
pub mod noop;
pub mod quality;
pub mod sql;
pub mod stage;

pub use dimension::{DimensionLoadAction, UpsertMode};
pub use fact::FactLoadAction;
pub use noop::NoopAction;
pub use quality::{QualityCheck, QualityCheckAction};
pub use sql::SqlScriptAction;
pub use stage::StageAction;

/// Error produced by a task action attempt.
///
/// `Failed` is retryable; `Fatal` and `Validation` are terminal. Validation
/// mismatches are never retried: re-running an identical check against
/// unchanged data cannot change the answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("{0}")]
    Failed(String),

    #[error("{0}")]
    Fatal(String),

    #[error("data quality check failed: {0}")]
    Validation(String),
}

impl ExecutionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutionError::Failed(_))
    }
}

/// Warehouse errors surface as retryable failures at the action boundary.
impl From<WarehouseError> for ExecutionError {
    fn from(err: WarehouseError) -> Self {
        ExecutionError::Failed(err.to_string())
    }
}

/// Everything an action gets to see while it runs: the warehouse handle and
/// the run's cancellation token. Cloned once per dispatched attempt.
#[derive(Clone)]
pub struct ExecutionContext {
    warehouse: Arc<dyn Warehouse>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(warehouse: Arc<dyn Warehouse>, cancel: CancellationToken) -> Self {
        Self { warehouse, cancel }
    }

    pub fn warehouse(&self) -> &dyn Warehouse {
        self.warehouse.as_ref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cooperative cancellation point for actions that issue several
    /// statements. Returns a fatal error once the run has been cancelled.
    pub fn check_cancelled(&self) -> Result<(), ExecutionError> {
        if self.cancel.is_cancelled() {
            Err(ExecutionError::Fatal("run cancelled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// The single capability a task payload implements.
///
/// One invocation is one attempt: an opaque unit of work with a single
/// success/failure outcome and no partial-progress signal. Implementations
/// may block on external IO; the engine runs each attempt on its own Tokio
/// task.
pub trait TaskAction: Send + Sync + fmt::Debug {
    fn run<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>>;
}
