//! Execution plan resolution.
//!
//! The resolver partitions the task graph into an ordered sequence of
//! stages. Each stage holds tasks with no dependency among them, and
//! every dependency of a stage-k task is satisfied by stages 0..k-1.
//! Tasks within a stage run concurrently; stages are sequential
//! barriers.

use crate::core::graph::TaskGraph;
use crate::error::{Error, Result};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One stage of the execution plan: a set of mutually independent
/// task names.
///
/// Members are stored sorted by name so the partition is reproducible
/// byte-for-byte across runs; execution order within a stage is still
/// unspecified because members launch concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    members: Vec<String>,
}

impl Stage {
    fn new(mut members: Vec<String>) -> Self {
        members.sort_unstable();
        Self { members }
    }

    /// Task names in this stage, sorted.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Number of tasks in this stage.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the stage holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if the stage contains the named task.
    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }
}

/// Ordered sequence of stages covering every task exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    stages: Vec<Stage>,
}

impl ExecutionPlan {
    /// Partition the graph into execution stages.
    ///
    /// Repeatedly extracts the set of all unplaced tasks with
    /// in-degree zero as one stage, then decrements the in-degree of
    /// their dependents. For a fixed graph the stage partition is
    /// identical across runs.
    ///
    /// # Errors
    /// Returns `CycleDetected` naming the unplaceable tasks when no
    /// in-degree-zero task remains but unplaced tasks do.
    pub fn resolve(graph: &TaskGraph) -> Result<Self> {
        let g = graph.graph();

        let mut in_degree: HashMap<NodeIndex, usize> = g
            .node_indices()
            .map(|index| {
                let degree = g
                    .neighbors_directed(index, petgraph::Direction::Incoming)
                    .count();
                (index, degree)
            })
            .collect();

        let mut placed: HashSet<NodeIndex> = HashSet::new();
        let mut stages = Vec::new();

        while placed.len() < g.node_count() {
            let ready: Vec<NodeIndex> = g
                .node_indices()
                .filter(|index| !placed.contains(index) && in_degree[index] == 0)
                .collect();

            if ready.is_empty() {
                let mut remaining: Vec<String> = g
                    .node_indices()
                    .filter(|index| !placed.contains(index))
                    .map(|index| g[index].name.clone())
                    .collect();
                remaining.sort_unstable();
                return Err(Error::CycleDetected { tasks: remaining });
            }

            for &index in &ready {
                placed.insert(index);
                for dependent in g.neighbors_directed(index, petgraph::Direction::Outgoing) {
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree = degree.saturating_sub(1);
                    }
                }
            }

            let members = ready.iter().map(|&index| g[index].name.clone()).collect();
            stages.push(Stage::new(members));
        }

        Ok(Self { stages })
    }

    /// The ordered stages of this plan.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Number of stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Total number of tasks across all stages.
    pub fn task_count(&self) -> usize {
        self.stages.iter().map(|s| s.len()).sum()
    }

    /// Check if the plan holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Index of the stage containing the named task, if any.
    pub fn stage_of(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.contains(name))
    }
}
