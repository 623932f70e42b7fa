// src/action/dimension.rs

//! Dimension table load: replace-all or append via a select statement.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::info;

use crate::action::{ExecutionContext, ExecutionError, TaskAction};

/// Whether a dimension load clears existing rows first.
///
/// `Replace` (the default) deletes all rows and re-inserts, which makes the
/// load idempotent; `Append` only inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertMode {
    Replace,
    Append,
}

impl Default for UpsertMode {
    fn default() -> Self {
        UpsertMode::Replace
    }
}

/// Loads a dimension table from a transformation select statement.
#[derive(Debug, Clone)]
pub struct DimensionLoadAction {
    table: String,
    select: String,
    mode: UpsertMode,
}

impl DimensionLoadAction {
    pub fn new(table: impl Into<String>, select: impl Into<String>, mode: UpsertMode) -> Self {
        Self {
            table: table.into(),
            select: select.into(),
            mode,
        }
    }
}

impl TaskAction for DimensionLoadAction {
    fn run<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>> {
        Box::pin(async move {
            ctx.check_cancelled()?;

            if self.mode == UpsertMode::Replace {
                info!(table = %self.table, "clearing dimension table before load");
                ctx.warehouse()
                    .execute(&format!("DELETE FROM {}", self.table))?;
            }

            ctx.check_cancelled()?;
            let inserted = ctx
                .warehouse()
                .execute(&format!("INSERT INTO {} {}", self.table, self.select))?;

            info!(
                table = %self.table,
                mode = ?self.mode,
                rows = inserted,
                "dimension load complete"
            );
            Ok(())
        })
    }
}
