// SPDX-License-Identifier: MIT OR Apache-2.0
//! Assembles an [`ic_pipeline::Pipeline`] from catalog/tenant seed
//! files and adapts it to [`ic_batch::ItemResolver`] for the `batch`
//! subcommand.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ic_core::IntentError;
use ic_decompose::{Decomposer, EchoDecomposer, HttpDecomposer};
use ic_pipeline::{Pipeline, ResolveInput};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Build a [`Pipeline`] seeded from a catalog JSON file and a tenant
/// JSON file, using an in-memory rate limiter and tenant store.
///
/// When `decomposer_config` is `Some`, the reasoning path calls a real
/// hosted-model endpoint via [`HttpDecomposer`]; otherwise it uses
/// [`EchoDecomposer`] with no canned responses, which degrades every
/// reasoning-path request to a clarification request — suitable for
/// smoke-testing the fast path without a live model.
///
/// # Errors
///
/// Returns an error if the catalog or tenant file cannot be read or
/// parsed.
pub async fn build_pipeline(
    catalog_path: &Path,
    tenant_path: &Path,
    decomposer_config: Option<ic_config::DecomposerSettings>,
) -> Result<Pipeline> {
    let embedder = Arc::new(ic_embed::HashingEmbedder::new());
    let catalog = Arc::new(ic_catalog::InMemoryCatalog::new());
    catalog
        .refresh(embedder.as_ref(), catalog_path)
        .await
        .with_context(|| format!("load catalog from '{}'", catalog_path.display()))?;

    let tenants_raw = crate::commands::validate_tenant_file(tenant_path)
        .with_context(|| format!("load tenants from '{}'", tenant_path.display()))?;
    let tenants = Arc::new(ic_tenant::InMemoryTenantStore::seeded(tenants_raw));

    let decomposer: Arc<dyn Decomposer> = match decomposer_config {
        Some(settings) => {
            let config = ic_decompose::DecomposerConfig {
                endpoint: settings.endpoint,
                api_key: settings.api_key,
                timeout: Duration::from_secs(settings.timeout_secs),
                retry_jitter: Duration::from_millis(settings.retry_jitter_ms),
            };
            Arc::new(HttpDecomposer::new(config))
        }
        None => Arc::new(EchoDecomposer::new()),
    };

    Ok(Pipeline {
        tenants,
        rate_limiter: Arc::new(ic_ratelimit::InMemoryTokenBucketStore::new()),
        embedder,
        catalog,
        decomposer,
    })
}

/// Adapts a [`Pipeline`] to [`ic_batch::ItemResolver`] so the batch
/// engine can drive it without depending on `ic-pipeline` directly.
pub struct PipelineItemResolver {
    pipeline: Arc<Pipeline>,
}

impl PipelineItemResolver {
    /// Wrap a pipeline for batch-engine use.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl ic_batch::ItemResolver for PipelineItemResolver {
    async fn resolve_item(
        &self,
        tenant_id: Uuid,
        raw_text: &str,
    ) -> Result<ic_core::ResolveOutput, IntentError> {
        self.pipeline
            .resolve(ResolveInput {
                tenant_id,
                raw_text: raw_text.to_string(),
                previous_intents: Vec::new(),
            })
            .await
    }
}
