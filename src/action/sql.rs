// src/action/sql.rs

//! Plain SQL action: run an ordered list of statements.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::action::{ExecutionContext, ExecutionError, TaskAction};

/// Executes statements in order, stopping at the first failure. Used for
/// schema setup (`create table if not exists ...`) and other DDL-style tasks
/// that don't fit the load adapters.
#[derive(Debug, Clone)]
pub struct SqlScriptAction {
    statements: Vec<String>,
}

impl SqlScriptAction {
    pub fn new(statements: Vec<String>) -> Self {
        Self { statements }
    }
}

impl TaskAction for SqlScriptAction {
    fn run<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>> {
        Box::pin(async move {
            for statement in &self.statements {
                ctx.check_cancelled()?;
                ctx.warehouse().execute(statement)?;
            }

            info!(statements = self.statements.len(), "sql script complete");
            Ok(())
        })
    }
}
