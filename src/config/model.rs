// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::action::UpsertMode;

/// Top-level pipeline definition as read from a TOML file.
///
/// ```toml
/// [engine]
/// retry_limit = 3
/// retry_delay_secs = 300
///
/// [connection]
/// dsn_env = "PIPEDAG_DSN"
///
/// [task.stage_events]
/// kind = "stage"
/// table = "staging_events"
/// source = "s3://bucket/log_data"
/// depends_on = ["create_tables"]
/// ```
///
/// All sections except `[task.*]` are optional and have defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPipelineFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub connection: ConnectionSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A pipeline file that has passed [`validate`](crate::config::validate).
#[derive(Debug, Clone)]
pub struct PipelineFile {
    pub engine: EngineSection,
    pub connection: ConnectionSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl PipelineFile {
    /// Construct without re-validating. Only `validate` should call this.
    pub fn new_unchecked(
        engine: EngineSection,
        connection: ConnectionSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            engine,
            connection,
            task,
        }
    }
}

/// `[engine]` section: run-wide scheduling policy.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Max retries per task after the first failure.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Fixed delay between attempts, in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Upper bound on concurrently running tasks; absent = unbounded.
    #[serde(default)]
    pub max_parallel_tasks: Option<usize>,

    /// Whether skipped tasks fail the overall run.
    #[serde(default = "default_fail_run_on_skip")]
    pub fail_run_on_skip: bool,
}

fn default_retry_limit() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    300
}

fn default_fail_run_on_skip() -> bool {
    true
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            retry_limit: default_retry_limit(),
            retry_delay_secs: default_retry_delay_secs(),
            max_parallel_tasks: None,
            fail_run_on_skip: default_fail_run_on_skip(),
        }
    }
}

/// `[connection]` section: how to reach the warehouse and the staging store.
///
/// Credential *values* never appear here, only environment variable names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionSection {
    /// Literal DSN (useful for local development).
    pub dsn: Option<String>,
    /// Environment variable holding the DSN.
    pub dsn_env: Option<String>,
    /// Environment variable holding the staging access key id.
    pub aws_key_env: Option<String>,
    /// Environment variable holding the staging secret access key.
    pub aws_secret_env: Option<String>,
}

/// What kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Noop,
    Sql,
    Stage,
    Dimension,
    Fact,
    Quality,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Noop => "noop",
            TaskKind::Sql => "sql",
            TaskKind::Stage => "stage",
            TaskKind::Dimension => "dimension",
            TaskKind::Fact => "fact",
            TaskKind::Quality => "quality",
        };
        f.write_str(name)
    }
}

/// Source file format for `stage` tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageFormat {
    Json,
    Csv,
}

impl Default for StageFormat {
    fn default() -> Self {
        StageFormat::Json
    }
}

/// One `[[task.<name>.check]]` entry of a quality task.
#[derive(Debug, Clone, Deserialize)]
pub struct QualityCheckConfig {
    pub query: String,
    pub expected: i64,
}

/// One `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub kind: TaskKind,

    /// Names of tasks that must succeed before this one runs.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Target table (`stage`, `dimension`, `fact`).
    pub table: Option<String>,

    /// Transformation select statement (`dimension`, `fact`).
    pub select: Option<String>,

    /// Object-store location to load from (`stage`).
    pub source: Option<String>,

    /// Source format for `stage` tasks.
    #[serde(default)]
    pub format: StageFormat,

    /// Optional jsonpaths mapping file for JSON staging.
    pub json_paths: Option<String>,

    /// Delimiter for CSV staging; defaults to `,`.
    pub csv_delimiter: Option<char>,

    /// Upsert mode for `dimension` tasks; defaults to `replace`.
    #[serde(default)]
    pub mode: UpsertMode,

    /// Statements for `sql` tasks, run in order.
    #[serde(default)]
    pub statements: Vec<String>,

    /// Checks for `quality` tasks, run in order.
    #[serde(default)]
    pub check: Vec<QualityCheckConfig>,

    /// Per-task retry overrides.
    pub retry_limit: Option<u32>,
    pub retry_delay_secs: Option<u64>,
}
