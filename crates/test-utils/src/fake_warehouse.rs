use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use pipedag::warehouse::{CopySource, Warehouse, WarehouseError};

/// In-memory warehouse double.
///
/// Models just enough SQL to exercise the load adapters: per-table row
/// counts driven by statement prefixes (`DELETE FROM`, `INSERT INTO`),
/// scripted scalar results keyed by query text, and per-table copy
/// failures. Every statement is logged verbatim for order assertions.
#[derive(Debug, Default)]
pub struct FakeWarehouse {
    rows: Mutex<HashMap<String, u64>>,
    statements: Mutex<Vec<String>>,
    scalars: Mutex<HashMap<String, i64>>,
    fail_copy_tables: Mutex<HashSet<String>>,
}

/// Rows a successful bulk copy "loads".
const COPY_ROWS: u64 = 1000;
/// Rows an `INSERT INTO ... SELECT` "produces".
const INSERT_ROWS: u64 = 5;

impl FakeWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the scalar result for an exact query string.
    pub fn set_scalar(&self, query: &str, value: i64) {
        self.scalars.lock().unwrap().insert(query.to_string(), value);
    }

    /// Make `copy_into` fail for the given target table.
    pub fn fail_copy_into(&self, table: &str) {
        self.fail_copy_tables
            .lock()
            .unwrap()
            .insert(table.to_string());
    }

    pub fn row_count(&self, table: &str) -> u64 {
        self.rows.lock().unwrap().get(table).copied().unwrap_or(0)
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

/// First whitespace-delimited word after `prefix`, if the statement starts
/// with it.
fn table_after<'a>(statement: &'a str, prefix: &str) -> Option<&'a str> {
    statement
        .strip_prefix(prefix)
        .and_then(|rest| rest.split_whitespace().next())
}

impl Warehouse for FakeWarehouse {
    fn execute(&self, statement: &str) -> Result<u64, WarehouseError> {
        self.statements.lock().unwrap().push(statement.to_string());

        if let Some(table) = table_after(statement, "DELETE FROM ") {
            let mut rows = self.rows.lock().unwrap();
            let previous = rows.insert(table.to_string(), 0).unwrap_or(0);
            return Ok(previous);
        }

        if let Some(table) = table_after(statement, "INSERT INTO ") {
            let mut rows = self.rows.lock().unwrap();
            *rows.entry(table.to_string()).or_insert(0) += INSERT_ROWS;
            return Ok(INSERT_ROWS);
        }

        // DDL and anything else: no rows affected.
        Ok(0)
    }

    fn query_scalar(&self, query: &str) -> Result<i64, WarehouseError> {
        self.statements.lock().unwrap().push(query.to_string());
        Ok(self
            .scalars
            .lock()
            .unwrap()
            .get(query)
            .copied()
            .unwrap_or(0))
    }

    fn copy_into(&self, table: &str, source: &CopySource) -> Result<(), WarehouseError> {
        self.statements
            .lock()
            .unwrap()
            .push(format!("COPY {} FROM '{}'", table, source.uri));

        if self.fail_copy_tables.lock().unwrap().contains(table) {
            return Err(WarehouseError::Statement(format!(
                "copy into {table} failed"
            )));
        }

        let mut rows = self.rows.lock().unwrap();
        *rows.entry(table.to_string()).or_insert(0) += COPY_ROWS;
        Ok(())
    }
}
