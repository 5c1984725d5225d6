use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::orchestration::{ExecutorConfig, RetryPolicy};
use crate::{flog_debug, Error, Result};

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_attempt_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum provider attempts per task (including the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay between retries, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on the backoff delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// How long a single provider attempt may run, in seconds.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    /// Cap on concurrently running tasks within a stage. None = unbounded.
    pub stage_concurrency: Option<usize>,
    /// Provider command to invoke for content generation.
    pub command: Option<String>,
    /// Directory for generated documents.
    pub output_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            stage_concurrency: None,
            command: None,
            output_dir: None,
        }
    }
}

impl Config {
    pub fn folio_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".folio"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::folio_dir()?.join("folio.toml"))
    }

    pub fn output_dir(&self) -> Result<PathBuf> {
        match &self.output_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(Self::folio_dir()?.join("documents")),
        }
    }

    pub fn effective_command(&self) -> &str {
        self.command.as_deref().unwrap_or("claude")
    }

    /// Retry policy derived from the configured attempt count and backoff.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }

    /// Executor configuration derived from this config.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            retry: self.retry_policy(),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            stage_concurrency: self.stage_concurrency,
        }
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        flog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            flog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        flog_debug!(
            "Config loaded: max_attempts={}, timeout={}s, command={:?}",
            config.max_attempts,
            config.attempt_timeout_secs,
            config.command
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let folio_dir = Self::folio_dir()?;
        flog_debug!("Config::save folio_dir={}", folio_dir.display());
        if !folio_dir.exists() {
            fs::create_dir_all(&folio_dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        flog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        let folio_dir = Self::folio_dir()?;
        let output_dir = self.output_dir()?;
        if !folio_dir.exists() {
            fs::create_dir_all(&folio_dir)?;
        }
        if !output_dir.exists() {
            fs::create_dir_all(&output_dir)?;
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
