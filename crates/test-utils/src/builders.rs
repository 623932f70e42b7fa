#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pipedag::action::{TaskAction, UpsertMode};
use pipedag::config::{
    ConnectionSection, EngineSection, PipelineFile, QualityCheckConfig, RawPipelineFile,
    StageFormat, TaskConfig, TaskKind,
};
use pipedag::dag::{GraphBuilder, RetryPolicy, TaskGraph, TaskSpec};

/// Builder for `PipelineFile` to simplify test setup.
pub struct PipelineFileBuilder {
    raw: RawPipelineFile,
}

impl PipelineFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawPipelineFile {
                engine: EngineSection::default(),
                connection: ConnectionSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.raw.task.insert(name.to_string(), task);
        self
    }

    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.raw.engine.retry_limit = limit;
        self
    }

    pub fn with_retry_delay_secs(mut self, secs: u64) -> Self {
        self.raw.engine.retry_delay_secs = secs;
        self
    }

    pub fn with_max_parallel_tasks(mut self, limit: usize) -> Self {
        self.raw.engine.max_parallel_tasks = Some(limit);
        self
    }

    pub fn with_fail_run_on_skip(mut self, val: bool) -> Self {
        self.raw.engine.fail_run_on_skip = val;
        self
    }

    pub fn build(self) -> PipelineFile {
        PipelineFile::try_from(self.raw).expect("Failed to build valid pipeline from builder")
    }
}

impl Default for PipelineFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            task: TaskConfig {
                kind,
                depends_on: vec![],
                table: None,
                select: None,
                source: None,
                format: StageFormat::Json,
                json_paths: None,
                csv_delimiter: None,
                mode: UpsertMode::Replace,
                statements: vec![],
                check: vec![],
                retry_limit: None,
                retry_delay_secs: None,
            },
        }
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.task.depends_on.push(dep.to_string());
        self
    }

    pub fn table(mut self, table: &str) -> Self {
        self.task.table = Some(table.to_string());
        self
    }

    pub fn select(mut self, select: &str) -> Self {
        self.task.select = Some(select.to_string());
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.task.source = Some(source.to_string());
        self
    }

    pub fn format(mut self, format: StageFormat) -> Self {
        self.task.format = format;
        self
    }

    pub fn json_paths(mut self, paths: &str) -> Self {
        self.task.json_paths = Some(paths.to_string());
        self
    }

    pub fn mode(mut self, mode: UpsertMode) -> Self {
        self.task.mode = mode;
        self
    }

    pub fn statement(mut self, statement: &str) -> Self {
        self.task.statements.push(statement.to_string());
        self
    }

    pub fn check(mut self, query: &str, expected: i64) -> Self {
        self.task.check.push(QualityCheckConfig {
            query: query.to_string(),
            expected,
        });
        self
    }

    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.task.retry_limit = Some(limit);
        self
    }

    pub fn retry_delay_secs(mut self, secs: u64) -> Self {
        self.task.retry_delay_secs = Some(secs);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Retry policy with a delay short enough for tests.
pub fn fast_retry(limit: u32) -> RetryPolicy {
    RetryPolicy {
        limit,
        delay: Duration::from_millis(10),
    }
}

/// Task spec with no retries and a test-friendly id.
pub fn spec(id: &str, action: Arc<dyn TaskAction>) -> TaskSpec {
    TaskSpec::new(id, action).with_retry(fast_retry(0))
}

/// Assemble a graph from specs and `(from, to)` edges, panicking on invalid
/// input (tests construct valid graphs unless they test validation).
pub fn build_graph(specs: Vec<TaskSpec>, edges: &[(&str, &str)]) -> TaskGraph {
    let mut builder = GraphBuilder::new();
    for task in specs {
        builder.add_task(task).expect("duplicate task in test graph");
    }
    for (from, to) in edges {
        builder
            .add_dependency(from, to)
            .expect("invalid edge in test graph");
    }
    builder.build().expect("test graph failed validation")
}
