//! Degraded content provider.
//!
//! Stands behind the same `produce` contract as the real backend and
//! returns deterministic offline content, so a run can complete when
//! the external service is unavailable. Selection happens through the
//! provider registry; the executor has no special case for it.

use crate::provider::{ContentProvider, ProviderError, SectionRequest};
use async_trait::async_trait;
use std::collections::HashMap;

/// Provider returning canned or placeholder content. Never fails.
#[derive(Debug, Clone, Default)]
pub struct DegradedProvider {
    /// Canned content keyed by task name.
    canned: HashMap<String, String>,
}

impl DegradedProvider {
    /// Create a provider with no canned content; every section gets a
    /// deterministic placeholder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register canned content for a specific task.
    pub fn with_content(mut self, task_name: &str, content: &str) -> Self {
        self.canned
            .insert(task_name.to_string(), content.to_string());
        self
    }
}

#[async_trait]
impl ContentProvider for DegradedProvider {
    async fn produce(&self, request: SectionRequest<'_>) -> Result<String, ProviderError> {
        if let Some(content) = self.canned.get(request.task_name) {
            return Ok(content.clone());
        }

        Ok(format!(
            "*Offline placeholder for section `{}` ({} upstream input(s) available).*",
            request.task_name,
            request.inputs.len()
        ))
    }
}
