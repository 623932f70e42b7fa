// src/action/fact.rs

//! Fact table load: append-only insert via a select statement.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::action::{ExecutionContext, ExecutionError, TaskAction};

/// Appends the rows produced by a transformation select statement into a
/// fact table. Fact loads never delete; history accumulates across runs.
#[derive(Debug, Clone)]
pub struct FactLoadAction {
    table: String,
    select: String,
}

impl FactLoadAction {
    pub fn new(table: impl Into<String>, select: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: select.into(),
        }
    }
}

impl TaskAction for FactLoadAction {
    fn run<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>> {
        Box::pin(async move {
            ctx.check_cancelled()?;

            let inserted = ctx
                .warehouse()
                .execute(&format!("INSERT INTO {} {}", self.table, self.select))?;

            info!(table = %self.table, rows = inserted, "fact load complete");
            Ok(())
        })
    }
}
