// src/dag/graph.rs

//! Immutable task graph: topology plus per-task specs.

use std::collections::HashMap;
use std::fmt;

use crate::dag::task_state::{TaskSpec, TaskState};
use crate::engine::TaskId;

/// Internal node: the task spec plus adjacency in both directions.
struct TaskNode {
    spec: TaskSpec,
    /// Direct dependencies: tasks that must succeed before this one runs.
    deps: Vec<TaskId>,
    /// Direct dependents: tasks that list this one as a dependency.
    dependents: Vec<TaskId>,
}

/// A validated, immutable DAG of tasks.
///
/// Built by [`GraphBuilder`](crate::dag::builder::GraphBuilder), which has
/// already rejected duplicates, unknown dependency endpoints, and cycles.
/// Node iteration follows insertion order, which makes readiness decisions
/// deterministic among ties.
pub struct TaskGraph {
    order: Vec<TaskId>,
    nodes: HashMap<TaskId, TaskNode>,
}

impl TaskGraph {
    pub(crate) fn from_parts(
        order: Vec<TaskId>,
        specs: HashMap<TaskId, TaskSpec>,
        edges: &[(TaskId, TaskId)],
    ) -> Self {
        let mut nodes: HashMap<TaskId, TaskNode> = specs
            .into_iter()
            .map(|(id, spec)| {
                (
                    id,
                    TaskNode {
                        spec,
                        deps: Vec::new(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        for (from, to) in edges {
            if let Some(node) = nodes.get_mut(to) {
                node.deps.push(from.clone());
            }
            if let Some(node) = nodes.get_mut(from) {
                node.dependents.push(to.clone());
            }
        }

        Self { order, nodes }
    }

    /// All task ids, in insertion order.
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn spec(&self, id: &str) -> Option<&TaskSpec> {
        self.nodes.get(id).map(|n| &n.spec)
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.nodes.get(id).map(|n| n.deps.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks that are runnable right now: `Pending`, with every upstream
    /// dependency `Succeeded` (a `Failed`/`Skipped` upstream disqualifies a
    /// task permanently; the scheduler marks it `Skipped` instead).
    ///
    /// Results follow insertion order.
    pub fn ready_tasks<F>(&self, state_of: F) -> Vec<TaskId>
    where
        F: Fn(&str) -> Option<TaskState>,
    {
        self.order
            .iter()
            .filter(|id| {
                let id = id.as_str();
                matches!(state_of(id), Some(TaskState::Pending))
                    && self
                        .dependencies_of(id)
                        .iter()
                        .all(|dep| matches!(state_of(dep), Some(TaskState::Succeeded)))
            })
            .cloned()
            .collect()
    }
}

impl fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.order)
            .finish_non_exhaustive()
    }
}
