//! Content provider boundary.
//!
//! The orchestration core treats content generation as an opaque,
//! possibly slow, possibly flaky external call. Providers implement
//! [`ContentProvider`] and classify failures as transient (eligible
//! for retry) or permanent (failed immediately), so the executor's
//! retry decision is a pure function of the returned error.

mod degraded;
mod headless;
mod registry;

pub use degraded::DegradedProvider;
pub use headless::{HeadlessProvider, RawProviderResponse};
pub use registry::ProviderRegistry;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Classified failure from a content-producing operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Retry-eligible failure: timeout, rate limit, transport error.
    #[error("transient provider error: {0}")]
    Transient(String),
    /// Non-retryable failure: invalid request, missing binary.
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

impl ProviderError {
    /// Check whether the executor may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// The underlying message, without the classification prefix.
    pub fn message(&self) -> &str {
        match self {
            ProviderError::Transient(msg) | ProviderError::Permanent(msg) => msg,
        }
    }
}

/// One content-generation request.
///
/// `inputs` holds only the `Success` content of the task's direct
/// dependencies, keyed by task name; the executor guarantees a
/// dependent is skipped before a failed upstream ever reaches a
/// provider.
#[derive(Debug)]
pub struct SectionRequest<'a> {
    /// Name of the task being generated.
    pub task_name: &'a str,
    /// Rendered prompt or specification for the section.
    pub prompt: &'a str,
    /// Successful upstream content, keyed by task name.
    pub inputs: &'a HashMap<String, String>,
}

impl SectionRequest<'_> {
    /// Render the prompt with upstream content appended as context
    /// blocks, in deterministic (sorted) order.
    pub fn render(&self) -> String {
        if self.inputs.is_empty() {
            return self.prompt.to_string();
        }

        let mut names: Vec<&String> = self.inputs.keys().collect();
        names.sort_unstable();

        let mut rendered = String::from(self.prompt);
        rendered.push_str("\n\n## Upstream context\n");
        for name in names {
            rendered.push_str(&format!("\n### {}\n{}\n", name, self.inputs[name]));
        }
        rendered
    }
}

/// The content-producing operation the orchestration core depends on.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Produce the content for one section.
    ///
    /// Implementations must not retry internally; the executor owns
    /// the retry policy and the per-attempt timeout.
    async fn produce(&self, request: SectionRequest<'_>) -> Result<String, ProviderError>;
}
