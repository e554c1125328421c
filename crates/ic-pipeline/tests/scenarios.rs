// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end scenarios driving [`Pipeline::resolve`] through every
//! branch: fast path, reasoning path, rate limiting, clarification, and
//! a full batch run through a real [`ic_batch::BatchEngine`].

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use ic_catalog::{InMemoryCatalog, VectorCatalog};
use ic_core::{
    ConstraintKind, EntityType, IntentCatalogEntry, IntentError, PathTaken, Tier, TenantConfig,
    TenantOverrides,
};
use ic_decompose::{echo::single_intent, DecomposeOutput, DecomposedIntent, EchoDecomposer};
use ic_embed::{Embedder, HashingEmbedder};
use ic_pipeline::{Pipeline, ResolveInput};
use ic_queue::JobPriority;
use ic_ratelimit::InMemoryTokenBucketStore;
use ic_tenant::{InMemoryTenantStore, TenantStore};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn tenant_with(tenant_id: Uuid, tier: Tier, overrides: TenantOverrides) -> TenantConfig {
    TenantConfig {
        tenant_id,
        name: "acme".to_string(),
        api_key: "key".to_string(),
        tier,
        is_active: true,
        overrides,
        created_at: chrono::Utc::now(),
    }
}

/// Build a pipeline seeded with the same example catalog the crate's
/// own unit tests use, plus a fresh in-memory tenant store, rate
/// limiter, and an [`EchoDecomposer`] the caller can register canned
/// responses on before resolving.
async fn seeded_pipeline(tenant: TenantConfig, decomposer: Arc<EchoDecomposer>) -> Pipeline {
    let tenants = Arc::new(InMemoryTenantStore::new());
    tenants.upsert(tenant).await.unwrap();

    let catalog = Arc::new(InMemoryCatalog::new());
    let embedder = HashingEmbedder;
    let examples = [
        ("ORDER_STATUS.WISMO", "order_status", "where is my order"),
        ("ORDER_STATUS.WISMO", "order_status", "track my package"),
        (
            "RETURN_EXCHANGE.RETURN_INITIATE",
            "return_exchange",
            "i want to return this item",
        ),
        ("COMPLAINT.DAMAGED_ITEM", "complaint", "my item arrived broken"),
    ];
    for (intent_code, category, example) in examples {
        let embedding = embedder.embed(example).await;
        catalog
            .insert(IntentCatalogEntry {
                id: Uuid::new_v4(),
                intent_code: intent_code.to_string(),
                category: category.to_string(),
                example_text: example.to_string(),
                embedding,
            })
            .await;
    }

    Pipeline {
        tenants,
        rate_limiter: Arc::new(InMemoryTokenBucketStore::new()),
        embedder: Arc::new(embedder),
        catalog,
        decomposer,
    }
}

#[tokio::test]
async fn fast_path_wismo_resolves_with_high_confidence() {
    let tenant_id = Uuid::new_v4();
    let tenant = tenant_with(tenant_id, Tier::Enterprise, TenantOverrides::default());
    let pipeline = seeded_pipeline(tenant, Arc::new(EchoDecomposer::new())).await;

    let out = pipeline
        .resolve(ResolveInput {
            tenant_id,
            raw_text: "where is my order #12345".to_string(),
            previous_intents: Vec::new(),
        })
        .await
        .unwrap();

    assert_eq!(out.path_taken, PathTaken::FastPath);
    assert_eq!(out.resolved_intents.len(), 1);
    assert_eq!(out.resolved_intents[0].category, "order_status");
    assert_eq!(out.resolved_intents[0].intent, "WISMO");
    assert!(out.confidence_summary >= 0.85);
    assert!(!out.requires_human);
}

#[tokio::test]
async fn compound_return_and_status_message_takes_reasoning_path() {
    let tenant_id = Uuid::new_v4();
    // Force the reasoning path so the scenario exercises the compound,
    // multi-intent decomposer output deterministically rather than
    // depending on the similarity heuristics happening to classify this
    // particular message as compound.
    let overrides = TenantOverrides {
        fast_path_enabled: Some(false),
        ..TenantOverrides::default()
    };
    let tenant = tenant_with(tenant_id, Tier::Enterprise, overrides);

    let decomposer = Arc::new(EchoDecomposer::new());
    decomposer.register(
        "i want to return order",
        DecomposeOutput {
            intents: vec![
                DecomposedIntent {
                    intent_code: "RETURN_EXCHANGE.RETURN_INITIATE".to_string(),
                    confidence: 0.9,
                    evidence: vec!["i want to return".to_string()],
                    constraints: Vec::new(),
                },
                DecomposedIntent {
                    intent_code: "ORDER_STATUS.WISMO".to_string(),
                    confidence: 0.88,
                    evidence: vec!["and check its status".to_string()],
                    constraints: Vec::new(),
                },
            ],
            is_compound: true,
            reasoning: "message names both a return and a status check".to_string(),
            requires_clarification: false,
            clarification_question: None,
        },
    );

    let pipeline = seeded_pipeline(tenant, decomposer).await;

    let out = pipeline
        .resolve(ResolveInput {
            tenant_id,
            raw_text: "I want to return order #555 and check its status".to_string(),
            previous_intents: Vec::new(),
        })
        .await
        .unwrap();

    assert_eq!(out.path_taken, PathTaken::ReasoningPath);
    assert_eq!(out.resolved_intents.len(), 2);
    let codes: Vec<(&str, &str)> = out
        .resolved_intents
        .iter()
        .map(|i| (i.category.as_str(), i.intent.as_str()))
        .collect();
    assert!(codes.contains(&("return_exchange", "RETURN_INITIATE")));
    assert!(codes.contains(&("order_status", "WISMO")));
}

#[tokio::test]
async fn damaged_item_with_deadline_extracts_constraint_and_entities() {
    let tenant_id = Uuid::new_v4();
    // Force the reasoning path regardless of similarity so the
    // decomposer's constraint string is the one that gets classified.
    let overrides = TenantOverrides {
        fast_path_enabled: Some(false),
        ..TenantOverrides::default()
    };
    let tenant = tenant_with(tenant_id, Tier::Enterprise, overrides);

    let decomposer = Arc::new(EchoDecomposer::new());
    decomposer.register(
        "my vase arrived shattered",
        single_intent(
            "COMPLAINT.DAMAGED_ITEM",
            0.92,
            vec!["arrived shattered".to_string()],
        ),
    );

    let pipeline = seeded_pipeline(tenant, decomposer).await;
    let raw_text = "My vase arrived shattered, I need a refund by Friday.";

    let out = pipeline
        .resolve(ResolveInput {
            tenant_id,
            raw_text: raw_text.to_string(),
            previous_intents: Vec::new(),
        })
        .await
        .unwrap();

    assert_eq!(out.path_taken, PathTaken::ReasoningPath);
    assert_eq!(out.resolved_intents.len(), 1);
    assert_eq!(out.resolved_intents[0].category, "COMPLAINT");
    assert_eq!(out.resolved_intents[0].intent, "DAMAGED_ITEM");
    assert!(out
        .entities
        .iter()
        .any(|e| e.entity_type == EntityType::Reason && e.value == "damaged"));
    assert!(out.entities.iter().any(|e| e.entity_type == EntityType::Deadline));
    for e in &out.entities {
        assert!(e.end_pos <= raw_text.len());
    }
}

#[tokio::test]
async fn sixth_call_within_a_minute_is_rate_limited() {
    let tenant_id = Uuid::new_v4();
    let tenant = tenant_with(tenant_id, Tier::Free, TenantOverrides::default());
    let pipeline = seeded_pipeline(tenant, Arc::new(EchoDecomposer::new())).await;

    for _ in 0..5 {
        let out = pipeline
            .resolve(ResolveInput {
                tenant_id,
                raw_text: "where is my order".to_string(),
                previous_intents: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(out.path_taken, PathTaken::FastPath);
    }

    let err = pipeline
        .resolve(ResolveInput {
            tenant_id,
            raw_text: "where is my order".to_string(),
            previous_intents: Vec::new(),
        })
        .await
        .unwrap_err();

    let code = err.code();
    match &err {
        IntentError::RateLimited { retry_after_secs } => assert!(*retry_after_secs > 0.0),
        other => panic!("expected RateLimited, got {other:?}"),
    }
    assert_eq!(code, ic_core::ErrorCode::RateLimited);
}

#[tokio::test]
async fn ambiguous_message_with_no_canned_response_requires_clarification() {
    let tenant_id = Uuid::new_v4();
    let tenant = tenant_with(tenant_id, Tier::Enterprise, TenantOverrides::default());
    let pipeline = seeded_pipeline(tenant, Arc::new(EchoDecomposer::new())).await;

    let out = pipeline
        .resolve(ResolveInput {
            tenant_id,
            raw_text: "please help".to_string(),
            previous_intents: Vec::new(),
        })
        .await
        .unwrap();

    assert_eq!(out.path_taken, PathTaken::ReasoningPath);
    assert!(out.resolved_intents.is_empty());
    assert!(out.requires_human);
    assert!(out.requires_human_reason.is_some());
    assert_eq!(out.confidence_summary, 0.0);
}

/// Drives [`ic_batch::BatchEngine`] against a real [`Pipeline`], the way
/// `ic-cli`'s wiring does, without making `ic-pipeline` depend on
/// `ic-batch` outside tests.
struct PipelineItemResolver {
    pipeline: Arc<Pipeline>,
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

struct RecordingWebhook {
    deliveries: Mutex<Vec<(String, String, Vec<u8>)>>,
}

#[async_trait]
impl ic_batch::WebhookSender for RecordingWebhook {
    async fn send(&self, url: &str, signature_header: &str, body: &[u8]) -> Result<(), String> {
        self.deliveries
            .lock()
            .unwrap()
            .push((url.to_string(), signature_header.to_string(), body.to_vec()));
        Ok(())
    }
}

fn expected_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
async fn batch_with_one_bad_item_reports_per_item_results_and_signed_webhook() {
    let tenant_id = Uuid::new_v4();
    let tenant = tenant_with(tenant_id, Tier::Enterprise, TenantOverrides::default());
    let pipeline = Arc::new(seeded_pipeline(tenant, Arc::new(EchoDecomposer::new())).await);

    let resolver = Arc::new(PipelineItemResolver {
        pipeline: Arc::clone(&pipeline),
    });
    let webhook = Arc::new(RecordingWebhook {
        deliveries: Mutex::new(Vec::new()),
    });
    let engine = ic_batch::BatchEngine::new(Arc::clone(&resolver), Arc::clone(&webhook), 100);

    let items = vec![
        ic_batch::BatchItem {
            item_id: "a".to_string(),
            raw_text: "where is my order".to_string(),
        },
        ic_batch::BatchItem {
            item_id: "b".to_string(),
            raw_text: String::new(),
        },
        ic_batch::BatchItem {
            item_id: "c".to_string(),
            raw_text: "i want to return this item".to_string(),
        },
    ];

    let secret = "shh".to_string();
    let job_id = engine
        .submit(
            tenant_id,
            &items,
            10,
            JobPriority::Normal,
            Some("https://example.test/hook".to_string()),
            Some(secret.clone()),
        )
        .unwrap();

    let mut by_job = HashMap::new();
    by_job.insert(job_id, items);
    engine.run_next(&by_job).await;

    let job = engine.job(job_id).unwrap();
    assert_eq!(job.status, ic_core::BatchStatus::Completed);
    assert_eq!(job.total_items, 3);
    assert_eq!(job.processed_items, 3);
    assert_eq!(job.failed_items, 1);
    assert_eq!(job.results[0].item_id, "a");
    assert!(job.results[0].success);
    assert_eq!(job.results[1].item_id, "b");
    assert!(!job.results[1].success);
    assert_eq!(job.results[1].error.as_ref().unwrap().code(), ic_core::ErrorCode::Validation);
    assert_eq!(job.results[2].item_id, "c");
    assert!(job.results[2].success);

    let deliveries = webhook.deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    let (url, signature, body) = &deliveries[0];
    assert_eq!(url, "https://example.test/hook");
    assert_eq!(*signature, expected_signature(&secret, body));

    let payload: serde_json::Value = serde_json::from_slice(body).unwrap();
    assert_eq!(payload["processed_items"], 3);
    assert_eq!(payload["failed_items"], 1);
}

#[test]
fn deadline_constraint_from_decomposer_is_marked_hard() {
    let c = ic_pipeline::classify_constraint("I need a refund by Friday");
    assert_eq!(c.kind, ConstraintKind::Deadline);
    assert!(c.hard);
}
