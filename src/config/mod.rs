// src/config/mod.rs

//! Declarative pipeline configuration.
//!
//! - [`model`] mirrors the TOML file structure.
//! - [`loader`] reads and deserializes a pipeline file.
//! - [`validate`] turns the raw file into a validated [`model::PipelineFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate};
pub use model::{
    ConnectionSection, EngineSection, PipelineFile, QualityCheckConfig, RawPipelineFile,
    StageFormat, TaskConfig, TaskKind,
};
