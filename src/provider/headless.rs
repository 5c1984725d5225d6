//! Headless LLM provider.
//!
//! The `HeadlessProvider` shells out to an LLM command-line tool in
//! non-interactive mode (`-p` flag) with JSON output parsing. The
//! configured command is a full command line; the first token is the
//! binary (resolved via `which`), the rest are passed through as
//! arguments on every invocation.

use crate::error::{Error, Result};
use crate::provider::{ContentProvider, ProviderError, SectionRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::process::Command;

/// JSON response envelope emitted by the provider binary.
#[derive(Debug, Deserialize)]
pub struct RawProviderResponse {
    /// The response type (currently unused but kept for future extensibility).
    #[serde(rename = "type")]
    #[allow(dead_code)]
    pub response_type: Option<String>,
    /// Generated content on success.
    pub result: Option<String>,
    /// Error message on failure.
    #[serde(default)]
    pub error: Option<String>,
}

/// Substrings marking an application-level error as retry-eligible.
const TRANSIENT_MARKERS: &[&str] = &["rate limit", "timeout", "timed out", "overloaded", "429", "503"];

/// Content provider that executes an LLM CLI binary per request.
///
/// # Example
///
/// ```ignore
/// use folio::provider::{ContentProvider, HeadlessProvider, SectionRequest};
///
/// let provider = HeadlessProvider::new("claude")?;
/// let content = provider.produce(request).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HeadlessProvider {
    /// Path to the provider binary.
    binary: PathBuf,
    /// Arguments passed through on every invocation.
    extra_args: Vec<String>,
}

impl HeadlessProvider {
    /// Create a provider from a command line string.
    ///
    /// The first token is resolved to a binary with `which`; remaining
    /// tokens become pass-through arguments.
    ///
    /// # Errors
    /// Returns an error if the command is empty or the binary cannot
    /// be found.
    pub fn new(command: &str) -> Result<Self> {
        let mut tokens = command.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| Error::Validation("empty provider command".to_string()))?;
        let binary =
            which::which(name).map_err(|_| Error::ProviderBinaryNotFound(name.to_string()))?;
        Ok(Self {
            binary,
            extra_args: tokens.map(|t| t.to_string()).collect(),
        })
    }

    /// Create a provider with a specific binary path.
    ///
    /// Useful for testing or when the binary is installed in a
    /// non-standard location.
    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary,
            extra_args: Vec::new(),
        }
    }

    /// The resolved binary path.
    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    /// Classify an application-level error message.
    fn classify(message: String) -> ProviderError {
        let lowered = message.to_lowercase();
        if TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
            ProviderError::Transient(message)
        } else {
            ProviderError::Permanent(message)
        }
    }

    /// Parse the JSON envelope from the binary's stdout.
    fn parse_response(stdout: &[u8]) -> std::result::Result<String, ProviderError> {
        let raw: RawProviderResponse = serde_json::from_slice(stdout).map_err(|e| {
            ProviderError::Transient(format!("unparseable provider response: {}", e))
        })?;

        if let Some(error) = raw.error {
            return Err(Self::classify(error));
        }

        raw.result
            .ok_or_else(|| ProviderError::Transient("provider response had no result".to_string()))
    }
}

#[async_trait]
impl ContentProvider for HeadlessProvider {
    async fn produce(&self, request: SectionRequest<'_>) -> std::result::Result<String, ProviderError> {
        let prompt = request.render();

        let output = Command::new(&self.binary)
            .args(&self.extra_args)
            .arg("-p")
            .arg(&prompt)
            .arg("--output-format")
            .arg("json")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProviderError::Permanent(format!(
                        "provider binary missing: {}",
                        self.binary.display()
                    ))
                } else {
                    ProviderError::Transient(format!("failed to launch provider: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Transient(format!(
                "provider exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Self::parse_response(&output.stdout)
    }
}
