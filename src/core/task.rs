//! Task data model for the section-generation graph.
//!
//! A [`SectionTask`] is the atomic unit of work: one named document
//! section, the prompt used to generate it, and the names of the
//! upstream sections it depends on. Tasks are immutable once registered
//! for a run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one orchestration run.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new unique run identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One section-generation task in the dependency graph.
///
/// Identity is the unique `name`. The `title` is the heading used when
/// the section is placed into the final document; the `prompt` is the
/// rendered specification handed to the content provider. `depends_on`
/// names the upstream sections whose content this task consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTask {
    /// Unique name identifying this task.
    pub name: String,
    /// Heading used for this section in the final document.
    pub title: String,
    /// Rendered prompt or specification passed to the provider.
    pub prompt: String,
    /// Names of upstream tasks whose output this task consumes.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Launch-order hint within a stage. Higher launches earlier.
    /// Never affects stage membership.
    #[serde(default)]
    pub priority: u32,
}

impl SectionTask {
    /// Create a new task with no dependencies and default priority.
    pub fn new(name: &str, title: &str, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            prompt: prompt.to_string(),
            depends_on: Vec::new(),
            priority: 0,
        }
    }

    /// Set the upstream dependencies for this task.
    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Set the launch-order priority hint.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Check whether this task has no upstream dependencies.
    pub fn is_root(&self) -> bool {
        self.depends_on.is_empty()
    }
}

/// Terminal outcome of a task's execution attempt.
///
/// Created when the attempt completes (or the task is preemptively
/// skipped) and immutable thereafter. Held in the run's results map
/// keyed by task name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TaskResult {
    /// The provider produced content for this section.
    Success {
        /// The generated section content.
        content: String,
    },
    /// The task failed after retries were exhausted (or immediately,
    /// for permanent errors).
    Failed {
        /// Error message describing the failure.
        error: String,
    },
    /// The task never ran because an upstream dependency did not
    /// succeed, or the run was cancelled before it started.
    Skipped {
        /// Reason the task was skipped.
        reason: String,
    },
}

impl TaskResult {
    /// Check if this result is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Success { .. })
    }

    /// Get the content if successful.
    pub fn content(&self) -> Option<&str> {
        match self {
            TaskResult::Success { content } => Some(content),
            _ => None,
        }
    }

    /// Human-readable reason for a non-success outcome.
    pub fn reason(&self) -> Option<&str> {
        match self {
            TaskResult::Success { .. } => None,
            TaskResult::Failed { error } => Some(error),
            TaskResult::Skipped { reason } => Some(reason),
        }
    }
}

impl std::fmt::Display for TaskResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskResult::Success { content } => write!(f, "success ({} bytes)", content.len()),
            TaskResult::Failed { error } => write!(f, "failed: {}", error),
            TaskResult::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}
