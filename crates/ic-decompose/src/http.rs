// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::{DecomposeInput, DecomposeOutput, Decomposer, DecomposerConfig, DecomposerError};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Production [`Decomposer`] backed by a hosted-model HTTP endpoint.
///
/// Honors an 8 s default timeout,
/// one retry on transport error with up to 250 ms of jitter, and no
/// retry on a structured-output validation failure (a validation
/// failure is the model's fault, not a transient one).
pub struct HttpDecomposer {
    client: reqwest::Client,
    config: DecomposerConfig,
}

impl HttpDecomposer {
    /// Build a decomposer from the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the underlying `reqwest::Client` cannot be constructed
    /// (TLS backend initialization failure), mirroring `reqwest`'s own
    /// `Client::new` panic contract.
    #[must_use]
    pub fn new(config: DecomposerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build reqwest client");
        Self { client, config }
    }

    async fn call_once(&self, input: &DecomposeInput) -> Result<DecomposeOutput, DecomposerError> {
        let mut req = self.client.post(&self.config.endpoint).json(input);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                DecomposerError::Timeout
            } else {
                DecomposerError::Unreachable(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            return Err(DecomposerError::Unreachable(format!(
                "endpoint returned status {}",
                resp.status()
            )));
        }

        let output: DecomposeOutput = resp
            .json()
            .await
            .map_err(|e| DecomposerError::InvalidResponse(e.to_string()))?;

        if !output.has_valid_taxonomy() {
            return Err(DecomposerError::InvalidResponse(
                "response named an intent code outside the closed taxonomy".to_string(),
            ));
        }

        Ok(output)
    }
}

#[async_trait]
impl Decomposer for HttpDecomposer {
    async fn decompose(&self, input: DecomposeInput) -> Result<DecomposeOutput, DecomposerError> {
        match self.call_once(&input).await {
            Ok(out) => Ok(out),
            Err(DecomposerError::InvalidResponse(reason)) => {
                Err(DecomposerError::InvalidResponse(reason))
            }
            Err(_transport_err) => {
                let jitter_ms = rand::thread_rng().gen_range(0..=self.config.retry_jitter.as_millis() as u64);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                tracing::warn!("decomposer call failed, retrying once after jitter");
                self.call_once(&input).await
            }
        }
    }
}
