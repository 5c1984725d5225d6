//! Dependency graph for section-generation tasks.
//!
//! This module provides the TaskGraph structure that represents
//! inter-section dependencies as a directed graph, enabling the
//! resolver to partition tasks into concurrently-executable stages.

use crate::core::task::SectionTask;
use crate::error::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// The section dependency graph.
///
/// TaskGraph uses petgraph's DiGraph to represent task dependencies.
/// Nodes are tasks; an edge from A to B means B declares A as an
/// upstream dependency. Edges are wired from each task's `depends_on`
/// list; a dependency naming an unregistered task is rejected. Cycles
/// are detected later, during plan resolution.
pub struct TaskGraph {
    /// The underlying directed graph.
    graph: DiGraph<SectionTask, ()>,
    /// Index mapping from task name to NodeIndex for fast lookups.
    name_index: HashMap<String, NodeIndex>,
}

impl TaskGraph {
    /// Create a new empty TaskGraph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_index: HashMap::new(),
        }
    }

    /// Build a graph from a set of tasks, wiring all declared
    /// dependencies.
    ///
    /// # Errors
    /// Returns `DuplicateTask` if two tasks share a name, and
    /// `UnknownDependency` if a task names a dependency that is not in
    /// the set.
    pub fn from_tasks(tasks: Vec<SectionTask>) -> Result<Self> {
        let mut graph = Self::new();
        for task in tasks {
            graph.add_task(task)?;
        }
        graph.link_dependencies()?;
        Ok(graph)
    }

    /// Add a task to the graph.
    ///
    /// The task's declared dependencies are not wired until
    /// [`link_dependencies`](Self::link_dependencies) runs, so tasks
    /// may be added in any order.
    ///
    /// # Errors
    /// Returns `DuplicateTask` if a task with the same name is already
    /// registered.
    pub fn add_task(&mut self, task: SectionTask) -> Result<NodeIndex> {
        if self.name_index.contains_key(&task.name) {
            return Err(Error::DuplicateTask(task.name));
        }

        let name = task.name.clone();
        let index = self.graph.add_node(task);
        self.name_index.insert(name, index);
        Ok(index)
    }

    /// Wire an edge for every declared dependency.
    ///
    /// An edge runs from the dependency to the dependent, so outgoing
    /// neighbors of a node are its dependents.
    ///
    /// # Errors
    /// Returns `UnknownDependency` naming the missing task if any
    /// dependency is not registered.
    pub fn link_dependencies(&mut self) -> Result<()> {
        let mut edges = Vec::new();
        for index in self.graph.node_indices() {
            let task = &self.graph[index];
            for dep in &task.depends_on {
                let dep_index =
                    self.name_index
                        .get(dep)
                        .copied()
                        .ok_or_else(|| Error::UnknownDependency {
                            task: task.name.clone(),
                            dependency: dep.clone(),
                        })?;
                edges.push((dep_index, index));
            }
        }
        for (from, to) in edges {
            if self.graph.find_edge(from, to).is_none() {
                self.graph.add_edge(from, to, ());
            }
        }
        Ok(())
    }

    /// Get a reference to a task by its name.
    pub fn get_task(&self, name: &str) -> Option<&SectionTask> {
        self.name_index
            .get(name)
            .and_then(|&index| self.graph.node_weight(index))
    }

    /// Get the NodeIndex for a task by its name.
    pub fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.name_index.get(name).copied()
    }

    /// Get the number of tasks in the graph.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of dependency edges in the graph.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the graph contains a task.
    pub fn contains_task(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Get all tasks that the given task depends on (predecessors).
    pub fn dependencies_of(&self, name: &str) -> Vec<&SectionTask> {
        if let Some(&index) = self.name_index.get(name) {
            self.graph
                .neighbors_directed(index, petgraph::Direction::Incoming)
                .filter_map(|neighbor| self.graph.node_weight(neighbor))
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Get all tasks that depend on the given task (successors).
    pub fn dependents_of(&self, name: &str) -> Vec<&SectionTask> {
        if let Some(&index) = self.name_index.get(name) {
            self.graph
                .neighbors_directed(index, petgraph::Direction::Outgoing)
                .filter_map(|neighbor| self.graph.node_weight(neighbor))
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Get all task names in the graph.
    pub fn task_names(&self) -> Vec<&str> {
        self.graph.node_weights().map(|t| t.name.as_str()).collect()
    }

    /// Clone the task set into a name-keyed map, as consumed by the
    /// executor.
    pub fn task_map(&self) -> HashMap<String, SectionTask> {
        self.graph
            .node_weights()
            .map(|t| (t.name.clone(), t.clone()))
            .collect()
    }

    /// Get the underlying graph for plan resolution.
    pub fn graph(&self) -> &DiGraph<SectionTask, ()> {
        &self.graph
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
