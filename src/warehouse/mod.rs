// src/warehouse/mod.rs

//! Warehouse access layer.
//!
//! [`Warehouse`] is the narrow contract the task actions execute SQL
//! through; the engine itself never touches it. The production
//! implementation lives in [`postgres`]; tests substitute an in-memory
//! fake.

use std::env;

use thiserror::Error;

use crate::config::model::ConnectionSection;
use crate::errors::PipedagError;

pub mod postgres;

pub use postgres::PostgresWarehouse;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WarehouseError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("statement failed: {0}")]
    Statement(String),

    #[error("scalar query returned no usable result: {0}")]
    BadScalar(String),
}

impl WarehouseError {
    /// Wrap any displayable error as a statement failure.
    pub fn statement(err: impl std::fmt::Display) -> Self {
        WarehouseError::Statement(err.to_string())
    }
}

/// File format of a bulk-copy source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyFormat {
    /// JSON lines, optionally with a jsonpaths mapping file.
    Json { json_paths: Option<String> },
    /// Delimited text.
    Csv { delimiter: char },
}

/// An external object-store location to bulk-load from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    pub uri: String,
    pub format: CopyFormat,
}

/// Credentials for reading the staging object store, resolved from the
/// environment at startup. Values never appear in the pipeline file.
#[derive(Debug, Clone)]
pub struct ObjectStoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Resolved connection parameters for the warehouse.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub dsn: String,
    pub staging: Option<ObjectStoreCredentials>,
}

impl ConnectionParams {
    /// Resolve the `[connection]` config section against the environment.
    ///
    /// The DSN comes from `dsn` verbatim or from the environment variable
    /// named by `dsn_env`. Staging credentials are resolved only when both
    /// env var names are configured.
    pub fn resolve(section: &ConnectionSection) -> Result<Self, PipedagError> {
        let dsn = match (&section.dsn, &section.dsn_env) {
            (Some(dsn), _) => dsn.clone(),
            (None, Some(var)) => env::var(var).map_err(|_| {
                PipedagError::Config(format!(
                    "[connection].dsn_env names '{var}' but it is not set"
                ))
            })?,
            (None, None) => {
                return Err(PipedagError::Config(
                    "[connection] requires either `dsn` or `dsn_env`".to_string(),
                ));
            }
        };

        let staging = match (&section.aws_key_env, &section.aws_secret_env) {
            (Some(key_var), Some(secret_var)) => {
                let access_key_id = env::var(key_var).map_err(|_| {
                    PipedagError::Config(format!(
                        "[connection].aws_key_env names '{key_var}' but it is not set"
                    ))
                })?;
                let secret_access_key = env::var(secret_var).map_err(|_| {
                    PipedagError::Config(format!(
                        "[connection].aws_secret_env names '{secret_var}' but it is not set"
                    ))
                })?;
                Some(ObjectStoreCredentials {
                    access_key_id,
                    secret_access_key,
                })
            }
            (None, None) => None,
            _ => {
                return Err(PipedagError::Config(
                    "[connection] staging credentials require both `aws_key_env` and `aws_secret_env`"
                        .to_string(),
                ));
            }
        };

        Ok(Self { dsn, staging })
    }
}

/// The SQL surface the task actions run against.
///
/// Identifiers and statements reaching these methods come from the pipeline
/// file, a closed caller-controlled set. Implementations must be
/// `Send + Sync` for use behind `Arc<dyn Warehouse>`.
pub trait Warehouse: Send + Sync {
    /// Execute a statement, returning the number of rows affected.
    fn execute(&self, statement: &str) -> Result<u64, WarehouseError>;

    /// Run a query expected to produce a single scalar (first column of the
    /// first row).
    fn query_scalar(&self, query: &str) -> Result<i64, WarehouseError>;

    /// Bulk-load an object-store location into `table`.
    fn copy_into(&self, table: &str, source: &CopySource) -> Result<(), WarehouseError>;
}
