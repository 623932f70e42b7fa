// src/errors.rs

//! Crate-wide error types and the `Result` alias.

use thiserror::Error;

use crate::engine::TaskId;
use crate::warehouse::WarehouseError;

/// Errors raised while constructing or validating a task graph.
///
/// All of these are fatal: a run never starts on a graph that failed
/// construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate task id '{0}' in graph")]
    DuplicateTask(TaskId),

    #[error("dependency references unknown task '{0}'")]
    UnknownTask(TaskId),

    #[error("cycle detected in task graph involving '{0}'")]
    Cycle(TaskId),
}

#[derive(Error, Debug)]
pub enum PipedagError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipedagError>;
