// src/warehouse/postgres.rs

//! Postgres-backed [`Warehouse`] implementation.
//!
//! Uses the sync `postgres` crate with a single `Mutex<Client>` for thread
//! safety; actions run on worker tasks and block for the duration of each
//! statement, which matches the one-outcome-per-attempt execution model.

use std::sync::{Mutex, MutexGuard};

use postgres::{Client, NoTls};
use tracing::debug;

use crate::warehouse::{
    ConnectionParams, CopyFormat, CopySource, ObjectStoreCredentials, Warehouse, WarehouseError,
};

pub struct PostgresWarehouse {
    client: Mutex<Client>,
    staging: Option<ObjectStoreCredentials>,
}

impl PostgresWarehouse {
    /// Connect with a libpq-style connection string or Postgres URI.
    pub fn connect(params: &ConnectionParams) -> Result<Self, WarehouseError> {
        let client = Client::connect(&params.dsn, NoTls)
            .map_err(|e| WarehouseError::Connection(e.to_string()))?;
        Ok(Self {
            client: Mutex::new(client),
            staging: params.staging.clone(),
        })
    }

    fn lock_client(&self) -> Result<MutexGuard<'_, Client>, WarehouseError> {
        self.client
            .lock()
            .map_err(|_| WarehouseError::Connection("client mutex poisoned".to_string()))
    }

    /// Render the bulk-copy statement for `source`.
    ///
    /// Table names come from the pipeline file (a closed set), credentials
    /// from the connection parameters; neither is runtime input.
    fn copy_statement(&self, table: &str, source: &CopySource) -> String {
        let mut stmt = format!("COPY {} FROM '{}'", table, source.uri);

        if let Some(creds) = &self.staging {
            stmt.push_str(&format!(
                " CREDENTIALS 'aws_access_key_id={};aws_secret_access_key={}'",
                creds.access_key_id, creds.secret_access_key
            ));
        }

        match &source.format {
            CopyFormat::Json { json_paths } => match json_paths {
                Some(paths) => stmt.push_str(&format!(" FORMAT AS JSON '{paths}'")),
                None => stmt.push_str(" FORMAT AS JSON 'auto'"),
            },
            CopyFormat::Csv { delimiter } => {
                stmt.push_str(&format!(" FORMAT AS CSV DELIMITER '{delimiter}'"));
            }
        }

        stmt
    }
}

impl Warehouse for PostgresWarehouse {
    fn execute(&self, statement: &str) -> Result<u64, WarehouseError> {
        debug!(statement, "executing statement");
        let mut client = self.lock_client()?;
        client
            .execute(statement, &[])
            .map_err(WarehouseError::statement)
    }

    fn query_scalar(&self, query: &str) -> Result<i64, WarehouseError> {
        debug!(query, "running scalar query");
        let mut client = self.lock_client()?;
        let row = client
            .query_opt(query, &[])
            .map_err(WarehouseError::statement)?
            .ok_or_else(|| WarehouseError::BadScalar(format!("no rows from `{query}`")))?;
        row.try_get::<_, i64>(0)
            .map_err(|e| WarehouseError::BadScalar(e.to_string()))
    }

    fn copy_into(&self, table: &str, source: &CopySource) -> Result<(), WarehouseError> {
        let statement = self.copy_statement(table, source);
        debug!(table, uri = %source.uri, "bulk-loading into table");
        let mut client = self.lock_client()?;
        client
            .batch_execute(&statement)
            .map_err(WarehouseError::statement)
    }
}
