//! Provider registry.
//!
//! Maps task names to content providers at construction time. The
//! closed registry replaces runtime type inspection: the executor asks
//! for a provider by task name and receives the registered override or
//! the default.

use crate::provider::ContentProvider;
use std::collections::HashMap;
use std::sync::Arc;

/// Task-name keyed provider selection with a default.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ContentProvider>>,
    default_provider: Arc<dyn ContentProvider>,
}

impl ProviderRegistry {
    /// Create a registry where every task uses the given provider.
    pub fn new(default_provider: Arc<dyn ContentProvider>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider,
        }
    }

    /// Register a provider override for a specific task.
    pub fn register(&mut self, task_name: &str, provider: Arc<dyn ContentProvider>) {
        self.providers.insert(task_name.to_string(), provider);
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with_provider(mut self, task_name: &str, provider: Arc<dyn ContentProvider>) -> Self {
        self.register(task_name, provider);
        self
    }

    /// Provider for the named task: the registered override, or the
    /// default.
    pub fn provider_for(&self, task_name: &str) -> Arc<dyn ContentProvider> {
        self.providers
            .get(task_name)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default_provider))
    }

    /// Check whether the task has a registered override.
    pub fn has_override(&self, task_name: &str) -> bool {
        self.providers.contains_key(task_name)
    }

    /// Number of registered overrides.
    pub fn override_count(&self) -> usize {
        self.providers.len()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("overrides", &self.providers.len())
            .finish()
    }
}
