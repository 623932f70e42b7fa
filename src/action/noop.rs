// src/action/noop.rs

use std::future::Future;
use std::pin::Pin;

use crate::action::{ExecutionContext, ExecutionError, TaskAction};

/// Succeeds immediately. Used for run boundary markers (`start`, `end`) that
/// only exist to shape the graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAction;

impl TaskAction for NoopAction {
    fn run<'a>(
        &'a self,
        _ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }
}
