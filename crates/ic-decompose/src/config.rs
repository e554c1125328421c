// SPDX-License-Identifier: MIT OR Apache-2.0
use std::time::Duration;

/// Configuration for an [`crate::HttpDecomposer`] instance.
#[derive(Debug, Clone)]
pub struct DecomposerConfig {
    /// Base URL of the hosted model endpoint.
    pub endpoint: String,
    /// Bearer token sent with each request.
    pub api_key: Option<String>,
    /// Per-call timeout before the request is abandoned.
    pub timeout: Duration,
    /// Maximum jitter added before the single retry attempt.
    pub retry_jitter: Duration,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8088/v1/decompose".to_string(),
            api_key: None,
            timeout: Duration::from_secs(8),
            retry_jitter: Duration::from_millis(250),
        }
    }
}

impl DecomposerConfig {
    /// Create a default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry jitter ceiling.
    #[must_use]
    pub fn with_retry_jitter(mut self, jitter: Duration) -> Self {
        self.retry_jitter = jitter;
        self
    }
}
