// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `resolve()` orchestrator: the heart of the intent resolution core.
//!
//! [`Pipeline::resolve`] admits a request, runs entity extraction and
//! embedding concurrently, matches against the catalog, detects
//! compound intents, decides between the fast and reasoning paths, and
//! finalizes a [`ResolveOutput`]. See the module-level stage order for the
//! staged contract this function implements verbatim.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use ic_catalog::VectorCatalog;
use ic_core::{
    Constraint, ConstraintKind, IntentError, PathTaken, RequestId, ResolveOutput, ResolvedIntent,
    TenantConfig,
};
use ic_decompose::{DecomposeInput, DecomposeOutput, Decomposer, MatchHint};
use ic_embed::Embedder;
use ic_match::MatchOutcome;
use ic_ratelimit::{tokens_for_path, BucketParams, TokenBucketStore};
use ic_tenant::TenantStore;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Instant;
use uuid::Uuid;

/// Maximum accepted message length in bytes, per the
/// boundary behavior.
pub const MAX_TEXT_BYTES: usize = 4096;

/// A caller's request to resolve one customer message.
#[derive(Debug, Clone)]
pub struct ResolveInput {
    /// The submitting tenant.
    pub tenant_id: Uuid,
    /// The raw customer message text.
    pub raw_text: String,
    /// Intents resolved earlier in the same conversation, if any —
    /// passed through to the decomposer as context.
    pub previous_intents: Vec<String>,
}

/// Everything [`Pipeline::resolve`] needs injected: the tenant store,
/// rate limiter, embedder, catalog, and decomposer. Each is a trait
/// object so tests can substitute fakes for any one of them.
pub struct Pipeline {
    /// Tenant lookup and per-tenant limit/flag resolution.
    pub tenants: std::sync::Arc<dyn TenantStore>,
    /// Atomic per-tenant rate limiting.
    pub rate_limiter: std::sync::Arc<dyn TokenBucketStore>,
    /// Text-to-vector embedding.
    pub embedder: std::sync::Arc<dyn Embedder>,
    /// The seeded intent catalog.
    pub catalog: std::sync::Arc<dyn VectorCatalog>,
    /// The LLM-backed reasoning fallback.
    pub decomposer: std::sync::Arc<dyn Decomposer>,
}

fn re_deadline_cue() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(by|before|deadline)\b").unwrap())
}

fn re_requirement_cue() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(must|require[sd]?|need(ed)?)\b").unwrap())
}

/// Translate a decomposer's free-text constraint string into a typed
/// [`Constraint`] using a cue-word heuristic:
/// "by/before/deadline" → deadline+hard; "must/require/need" →
/// requirement; else preference.
#[must_use]
pub fn classify_constraint(text: &str) -> Constraint {
    let (kind, hard) = if re_deadline_cue().is_match(text) {
        (ConstraintKind::Deadline, true)
    } else if re_requirement_cue().is_match(text) {
        (ConstraintKind::Requirement, false)
    } else {
        (ConstraintKind::Preference, false)
    };
    Constraint {
        kind,
        description: text.to_string(),
        hard,
    }
}

fn split_intent_code(code: &str) -> (String, String) {
    match code.split_once('.') {
        Some((category, intent)) => (category.to_string(), intent.to_string()),
        None => (code.to_string(), String::new()),
    }
}

#[async_trait]
impl Resolver for Pipeline {
    async fn resolve(&self, input: ResolveInput) -> Result<ResolveOutput, IntentError> {
        self.resolve(input).await
    }
}

/// Object-safe capability exposing [`Pipeline::resolve`], letting
/// `ic-batch` depend on the pipeline without a concrete type.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve one message end to end.
    async fn resolve(&self, input: ResolveInput) -> Result<ResolveOutput, IntentError>;
}

impl Pipeline {
    /// Run the full resolution pipeline for one message.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::Validation`] for empty or oversized text,
    /// [`IntentError::AuthInvalid`]/`AuthInactive` if the tenant cannot
    /// be admitted, [`IntentError::RateLimited`] if the tenant is over
    /// budget, and propagates embedding/catalog failures as
    /// [`IntentError::UpstreamUnavailable`].
    pub async fn resolve(&self, input: ResolveInput) -> Result<ResolveOutput, IntentError> {
        let started = Instant::now();
        let mut trace = Vec::new();

        if input.raw_text.is_empty() {
            return Err(IntentError::validation("raw_text must not be empty"));
        }
        if input.raw_text.len() > MAX_TEXT_BYTES {
            return Err(IntentError::validation(format!(
                "raw_text exceeds {MAX_TEXT_BYTES} bytes"
            )));
        }

        // 1. Admission.
        let tenant = self.admit(&input).await?;
        trace.push("admission: ok".to_string());

        // 2. Entity extraction and embed-then-match run concurrently.
        // Extraction is infallible (empty entities on failure); the
        // trace still records the attempt per the stage contract.
        let text_for_extract = input.raw_text.clone();
        let embedder = std::sync::Arc::clone(&self.embedder);
        let catalog = std::sync::Arc::clone(&self.catalog);
        let text_for_match = input.raw_text.clone();
        let (extraction, outcome) = tokio::join!(
            tokio::task::spawn_blocking(move || ic_extract::extract(&text_for_extract)),
            async move {
                ic_match::match_text(embedder.as_ref(), catalog.as_ref(), &text_for_match, ic_match::DEFAULT_TOP_K).await
            }
        );
        let extraction = extraction.unwrap_or_default();
        trace.push(format!("extract: {} entities", extraction.entities.len()));

        // 3. Match.
        trace.push(format!(
            "match: top1={:?} tier={:?}",
            outcome.top1().map(|c| c.similarity),
            outcome.tier
        ));

        // 4. Compound.
        let compound = ic_compound::detect(&input.raw_text, &outcome.candidates, &extraction.entities);
        trace.push(format!("compound: is_compound={}", compound.is_compound));

        // 5. Branch decision. A second category also clearing 0.85 is
        // the rare ambiguous case worth routing to reasoning rather
        // than emitting a spurious second fast-path intent.
        let top1 = outcome.top1();
        let gap = outcome.gap();
        let second_category_also_confident = outcome
            .top2()
            .is_some_and(|c| c.similarity >= 0.85 && Some(c.category.as_str()) != top1.map(|t| t.category.as_str()));
        let fast_path_eligible = top1.is_some_and(|c| c.similarity >= 0.85)
            && !compound.is_compound
            && gap >= 0.05
            && !second_category_also_confident
            && tenant.fast_path_enabled();

        let (resolved_intents, path_taken, requires_human, requires_human_reason, reasoning_trace, constraints) =
            if fast_path_eligible {
                trace.push("branch: fast_path".to_string());
                let intents = self.fast_path(&outcome);
                trace.push("fast_path: done".to_string());
                (intents, PathTaken::FastPath, false, None, Vec::new(), Vec::new())
            } else {
                trace.push("branch: reasoning_path".to_string());
                let (intents, human, reason, rtrace, constraints) = self
                    .reasoning_path(&tenant, &input, &extraction, &outcome)
                    .await?;
                trace.push("reasoning_path: done".to_string());
                (intents, PathTaken::ReasoningPath, human, reason, rtrace, constraints)
            };

        trace.extend(reasoning_trace);

        // Consume rate-limit tokens for the path actually taken. The
        // admission stage already reserved 1 token; the reasoning path
        // settles the remaining cost.
        if matches!(path_taken, PathTaken::ReasoningPath) {
            let extra = tokens_for_path(true, tenant.reasoning_path_token_cost()) - 1.0;
            if extra > 0.0 {
                let _ = self
                    .rate_limiter
                    .check(
                        tenant.tenant_id,
                        BucketParams {
                            rate_per_minute: f64::from(tenant.requests_per_minute()),
                            burst: f64::from(tenant.burst()),
                        },
                        extra,
                    )
                    .await;
            }
        }

        // 8. Finalization.
        let confidence_summary = resolved_intents
            .iter()
            .map(|i| i.confidence)
            .fold(None, |acc, c| Some(acc.map_or(c, |a: f64| a.min(c))))
            .unwrap_or(0.0);

        let requires_human = requires_human || confidence_summary < 0.60 || resolved_intents.is_empty();

        trace.push("finalize: done".to_string());

        Ok(ResolveOutput {
            request_id: RequestId::new(),
            resolved_intents,
            is_compound: compound.is_compound,
            entities: extraction.entities,
            constraints,
            confidence_summary,
            requires_human,
            requires_human_reason,
            reasoning_trace: trace,
            processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            path_taken,
        })
    }

    async fn admit(&self, input: &ResolveInput) -> Result<TenantConfig, IntentError> {
        let tenant = self
            .tenants
            .by_id(input.tenant_id)
            .await
            .map_err(|e| IntentError::internal(e.to_string()))?
            .ok_or(IntentError::AuthInvalid)?;

        if !tenant.is_active {
            return Err(IntentError::AuthInactive);
        }

        let decision = self
            .rate_limiter
            .check(
                tenant.tenant_id,
                BucketParams {
                    rate_per_minute: f64::from(tenant.requests_per_minute()),
                    burst: f64::from(tenant.burst()),
                },
                1.0,
            )
            .await?;

        if !decision.allowed {
            return Err(ic_ratelimit::denial_to_error(decision));
        }

        Ok(tenant)
    }

    fn fast_path(&self, outcome: &MatchOutcome) -> Vec<ResolvedIntent> {
        let Some(top1) = outcome.top1() else {
            return Vec::new();
        };
        let (category, intent) = split_intent_code(&top1.intent_code);
        vec![ResolvedIntent {
            category,
            intent,
            sub_intent: None,
            confidence: f64::from(top1.similarity),
            confidence_tier: ic_core::ConfidenceTier::High,
            evidence: vec![top1.matched_example.clone()],
        }]
    }

    async fn reasoning_path(
        &self,
        tenant: &TenantConfig,
        input: &ResolveInput,
        extraction: &ic_extract::ExtractionResult,
        outcome: &MatchOutcome,
    ) -> Result<(Vec<ResolvedIntent>, bool, Option<String>, Vec<String>, Vec<Constraint>), IntentError> {
        let mut trace = Vec::new();

        if !tenant.reasoning_path_enabled() {
            trace.push("reasoning_path: disabled for tenant, falling back to top-1".to_string());
            let intents = outcome
                .top1()
                .map(|top1| {
                    let (category, intent) = split_intent_code(&top1.intent_code);
                    vec![ResolvedIntent {
                        category,
                        intent,
                        sub_intent: None,
                        confidence: f64::from(top1.similarity),
                        confidence_tier: ic_core::ConfidenceTier::Low,
                        evidence: vec![top1.matched_example.clone()],
                    }]
                })
                .unwrap_or_default();
            return Ok((intents, true, None, trace, Vec::new()));
        }

        let decompose_input = DecomposeInput {
            raw_text: input.raw_text.clone(),
            extracted_entities: extraction.entities.clone(),
            match_hints: outcome
                .candidates
                .iter()
                .map(|c| MatchHint {
                    intent_code: c.intent_code.clone(),
                    similarity: c.similarity,
                })
                .collect(),
            customer_tier: Some(format!("{:?}", tenant.tier).to_lowercase()),
            previous_intents: input.previous_intents.clone(),
        };

        let decomposed = match self.decomposer.decompose(decompose_input).await {
            Ok(out) => out,
            Err(_) => {
                trace.push("reasoning_path: decomposer unavailable, degrading to top-1 LOW".to_string());
                let intents = outcome
                    .top1()
                    .map(|top1| {
                        let (category, intent) = split_intent_code(&top1.intent_code);
                        vec![ResolvedIntent {
                            category,
                            intent,
                            sub_intent: None,
                            confidence: f64::from(top1.similarity),
                            confidence_tier: ic_core::ConfidenceTier::Low,
                            evidence: vec![top1.matched_example.clone()],
                        }]
                    })
                    .unwrap_or_default();
                return Ok((intents, true, None, trace, Vec::new()));
            }
        };

        Ok(from_decomposed(decomposed, &mut trace))
    }
}

fn from_decomposed(
    decomposed: DecomposeOutput,
    trace: &mut Vec<String>,
) -> (Vec<ResolvedIntent>, bool, Option<String>, Vec<String>, Vec<Constraint>) {
    trace.push(format!("reasoning: {}", decomposed.reasoning));

    if decomposed.requires_clarification {
        trace.push("reasoning_path: clarification requested".to_string());
        return (
            Vec::new(),
            false,
            decomposed.clarification_question.clone(),
            std::mem::take(trace),
            Vec::new(),
        );
    }

    let mut constraints = Vec::new();
    let intents = decomposed
        .intents
        .into_iter()
        .map(|d| {
            let (category, intent) = split_intent_code(&d.intent_code);
            constraints.extend(d.constraints.iter().map(|c| classify_constraint(c)));
            ResolvedIntent {
                category,
                intent,
                sub_intent: None,
                confidence: d.confidence,
                confidence_tier: ic_core::ConfidenceTier::from_score(d.confidence),
                evidence: d.evidence,
            }
        })
        .collect();

    (intents, false, None, std::mem::take(trace), constraints)
}
