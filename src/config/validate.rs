// src/config/validate.rs

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::{PipedagError, Result};

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = PipedagError;

    fn try_from(raw: RawPipelineFile) -> std::result::Result<Self, Self::Error> {
        validate_raw(&raw)?;
        Ok(PipelineFile::new_unchecked(
            raw.engine,
            raw.connection,
            raw.task,
        ))
    }
}

fn validate_raw(raw: &RawPipelineFile) -> Result<()> {
    ensure_has_tasks(raw)?;
    validate_engine_section(raw)?;
    Ok(())
}

fn ensure_has_tasks(raw: &RawPipelineFile) -> Result<()> {
    if raw.task.is_empty() {
        return Err(PipedagError::Config(
            "pipeline must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_engine_section(raw: &RawPipelineFile) -> Result<()> {
    if raw.engine.max_parallel_tasks == Some(0) {
        return Err(PipedagError::Config(
            "[engine].max_parallel_tasks must be >= 1 when set (got 0)".to_string(),
        ));
    }
    Ok(())
}
