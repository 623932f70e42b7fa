// src/action/stage.rs

//! Staging action: bulk-load an object-store location into a table.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::action::{ExecutionContext, ExecutionError, TaskAction};
use crate::warehouse::CopySource;

/// Loads raw files from an external object store into a staging table via the
/// warehouse's bulk-copy path. The target table and source location are fixed
/// at graph construction; credentials live with the warehouse connection.
#[derive(Debug, Clone)]
pub struct StageAction {
    table: String,
    source: CopySource,
}

impl StageAction {
    pub fn new(table: impl Into<String>, source: CopySource) -> Self {
        Self {
            table: table.into(),
            source,
        }
    }
}

impl TaskAction for StageAction {
    fn run<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>> {
        Box::pin(async move {
            ctx.check_cancelled()?;

            info!(
                table = %self.table,
                source = %self.source.uri,
                "staging data into table"
            );
            ctx.warehouse().copy_into(&self.table, &self.source)?;

            info!(table = %self.table, "staging load complete");
            Ok(())
        })
    }
}
