// src/dag/builder.rs

//! Explicit graph construction with validation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::action::{
    DimensionLoadAction, FactLoadAction, NoopAction, QualityCheck, QualityCheckAction,
    SqlScriptAction, StageAction, TaskAction,
};
use crate::config::model::{PipelineFile, StageFormat, TaskConfig, TaskKind};
use crate::dag::graph::TaskGraph;
use crate::dag::task_state::{RetryPolicy, TaskSpec};
use crate::engine::TaskId;
use crate::errors::{GraphError, PipedagError};
use crate::warehouse::{CopyFormat, CopySource};

/// Builds a [`TaskGraph`] one task and one edge at a time.
///
/// The builder is the only way to obtain a graph, so every graph the engine
/// sees has passed duplicate, endpoint, and cycle validation.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    order: Vec<TaskId>,
    specs: HashMap<TaskId, TaskSpec>,
    edges: Vec<(TaskId, TaskId)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Fails if the id is already present.
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<(), GraphError> {
        if self.specs.contains_key(&spec.id) {
            return Err(GraphError::DuplicateTask(spec.id));
        }
        self.order.push(spec.id.clone());
        self.specs.insert(spec.id.clone(), spec);
        Ok(())
    }

    /// Add a precedence edge: `to` requires `from`'s success.
    ///
    /// Fails if either endpoint is unknown. A self-edge is reported as a
    /// cycle right away rather than waiting for [`validate`](Self::validate).
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        if !self.specs.contains_key(from) {
            return Err(GraphError::UnknownTask(from.to_string()));
        }
        if !self.specs.contains_key(to) {
            return Err(GraphError::UnknownTask(to.to_string()));
        }
        if from == to {
            return Err(GraphError::Cycle(from.to_string()));
        }

        let edge = (from.to_string(), to.to_string());
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        Ok(())
    }

    /// Topological feasibility check. Fails with [`GraphError::Cycle`] naming
    /// a task on the offending cycle.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for id in &self.order {
            graph.add_node(id.as_str());
        }
        for (from, to) in &self.edges {
            graph.add_edge(from.as_str(), to.as_str(), ());
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(GraphError::Cycle(cycle.node_id().to_string())),
        }
    }

    /// Validate and assemble the immutable graph.
    pub fn build(self) -> Result<TaskGraph, GraphError> {
        self.validate()?;
        Ok(TaskGraph::from_parts(self.order, self.specs, &self.edges))
    }
}

/// Build the task graph described by a validated pipeline file.
///
/// Engine-level retry defaults apply unless the task overrides them.
pub fn graph_from_pipeline(cfg: &PipelineFile) -> Result<TaskGraph, PipedagError> {
    let default_retry = RetryPolicy {
        limit: cfg.engine.retry_limit,
        delay: Duration::from_secs(cfg.engine.retry_delay_secs),
    };

    let mut builder = GraphBuilder::new();

    for (name, task) in cfg.task.iter() {
        let action = action_from_config(name, task)?;
        let retry = RetryPolicy {
            limit: task.retry_limit.unwrap_or(default_retry.limit),
            delay: task
                .retry_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(default_retry.delay),
        };
        builder.add_task(TaskSpec::new(name.clone(), action).with_retry(retry))?;
    }

    for (name, task) in cfg.task.iter() {
        for dep in &task.depends_on {
            builder.add_dependency(dep, name)?;
        }
    }

    Ok(builder.build()?)
}

/// Instantiate the action for one task config, checking per-kind fields.
fn action_from_config(
    name: &str,
    task: &TaskConfig,
) -> Result<Arc<dyn TaskAction>, PipedagError> {
    let missing = |field: &str| {
        PipedagError::Config(format!(
            "task '{name}': {} task requires `{field}`",
            task.kind
        ))
    };

    let action: Arc<dyn TaskAction> = match task.kind {
        TaskKind::Noop => Arc::new(NoopAction),

        TaskKind::Sql => {
            if task.statements.is_empty() {
                return Err(PipedagError::Config(format!(
                    "task '{name}': sql task requires at least one entry in `statements`"
                )));
            }
            Arc::new(SqlScriptAction::new(task.statements.clone()))
        }

        TaskKind::Stage => {
            let table = task.table.as_ref().ok_or_else(|| missing("table"))?;
            let uri = task.source.as_ref().ok_or_else(|| missing("source"))?;
            let format = match task.format {
                StageFormat::Json => CopyFormat::Json {
                    json_paths: task.json_paths.clone(),
                },
                StageFormat::Csv => CopyFormat::Csv {
                    delimiter: task.csv_delimiter.unwrap_or(','),
                },
            };
            Arc::new(StageAction::new(
                table.clone(),
                CopySource {
                    uri: uri.clone(),
                    format,
                },
            ))
        }

        TaskKind::Dimension => {
            let table = task.table.as_ref().ok_or_else(|| missing("table"))?;
            let select = task.select.as_ref().ok_or_else(|| missing("select"))?;
            Arc::new(DimensionLoadAction::new(
                table.clone(),
                select.clone(),
                task.mode,
            ))
        }

        TaskKind::Fact => {
            let table = task.table.as_ref().ok_or_else(|| missing("table"))?;
            let select = task.select.as_ref().ok_or_else(|| missing("select"))?;
            Arc::new(FactLoadAction::new(table.clone(), select.clone()))
        }

        TaskKind::Quality => {
            if task.check.is_empty() {
                return Err(PipedagError::Config(format!(
                    "task '{name}': quality task requires at least one [[task.{name}.check]]"
                )));
            }
            let checks = task
                .check
                .iter()
                .map(|c| QualityCheck {
                    query: c.query.clone(),
                    expected: c.expected,
                })
                .collect();
            Arc::new(QualityCheckAction::new(checks))
        }
    };

    Ok(action)
}
