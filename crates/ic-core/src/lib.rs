// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! `ic-core`
//!
//! The stable contract for the intent resolution core: the data model
//! shared by every other crate in the workspace, and the error taxonomy
//! all of them return. If you only take one dependency, take this one.

/// Stable error taxonomy for the intent resolution core.
pub mod error;

pub use error::{ErrorCode, IntentError};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Current contract version string embedded in all wire messages.
///
/// # Examples
///
/// ```
/// assert_eq!(ic_core::CONTRACT_VERSION, "ic/v1");
/// ```
pub const CONTRACT_VERSION: &str = "ic/v1";

/// Correlates a single inbound message through extraction, matching,
/// reasoning, and any downstream batch processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Mint a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed taxonomy of entity kinds the extractor recognizes.
///
/// Closed by design: callers may exhaustively match without a catch-all,
/// and the decomposer validates its own output against the same set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Order identifier (e.g. `#1234-5678`).
    OrderId,
    /// Carrier tracking number.
    TrackingNumber,
    /// A calendar date mentioned in the message.
    Date,
    /// A deadline the customer is holding the merchant to ("by Friday").
    Deadline,
    /// A monetary amount.
    Money,
    /// A clothing/product size.
    Size,
    /// A color.
    Color,
    /// A quantity of items.
    Quantity,
    /// A shipping or billing address fragment.
    Address,
    /// A person's name.
    PersonName,
    /// The stated reason for a return/complaint.
    Reason,
    /// An email address.
    Email,
    /// A phone number.
    Phone,
    /// Stated severity of damage to a received item.
    DamageSeverity,
    /// Category of a reported product defect.
    DefectCategory,
    /// A brand name.
    Brand,
    /// A shipping carrier name.
    Carrier,
}

/// A single extracted entity, anchored to its position in the source text.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    /// What kind of entity this is.
    pub entity_type: EntityType,
    /// The normalized value (e.g. a parsed date, an uppercased order id).
    pub value: String,
    /// The exact substring of the source text this entity was extracted from.
    pub raw_span: String,
    /// Byte offset of the span's start in the source text.
    pub start_pos: usize,
    /// Byte offset of the span's end (exclusive) in the source text.
    pub end_pos: usize,
    /// Extractor confidence in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// Confidence banding used to decide fast-path vs. reasoning-path routing
/// and to summarize a resolution for human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// Similarity score >= 0.85.
    High,
    /// Similarity score in `[0.60, 0.85)`.
    Medium,
    /// Similarity score < 0.60.
    Low,
}

impl ConfidenceTier {
    /// Classify a raw similarity/confidence score into a tier.
    ///
    /// # Examples
    ///
    /// ```
    /// use ic_core::ConfidenceTier;
    /// assert_eq!(ConfidenceTier::from_score(0.85), ConfidenceTier::High);
    /// assert_eq!(ConfidenceTier::from_score(0.84999), ConfidenceTier::Medium);
    /// assert_eq!(ConfidenceTier::from_score(0.60), ConfidenceTier::Medium);
    /// assert_eq!(ConfidenceTier::from_score(0.0), ConfidenceTier::Low);
    /// ```
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Self::High
        } else if score >= 0.60 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One candidate intent produced by matching or reasoning, ranked by
/// confidence within a [`ResolveOutput`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedIntent {
    /// Top-level category (e.g. `"order_status"`, `"returns"`).
    pub category: String,
    /// The specific intent code within the category.
    pub intent: String,
    /// An optional finer-grained sub-intent.
    pub sub_intent: Option<String>,
    /// Confidence score in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Tier derived from `confidence` via [`ConfidenceTier::from_score`].
    pub confidence_tier: ConfidenceTier,
    /// Short human-readable justifications (matched phrases, reasoning
    /// steps) supporting this intent, in the order they were produced.
    pub evidence: Vec<String>,
}

/// The kind of constraint a [`Constraint`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// A time-bound the customer expects to be honored.
    Deadline,
    /// A soft preference, non-binding.
    Preference,
    /// A hard requirement the customer has stated.
    Requirement,
    /// A merchant policy constraint surfaced during reasoning.
    Policy,
}

/// A constraint on how a resolved intent should be fulfilled, surfaced by
/// extraction or reasoning (e.g. "needs to arrive by Friday").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Constraint {
    /// What kind of constraint this is.
    pub kind: ConstraintKind,
    /// Human-readable description of the constraint.
    pub description: String,
    /// Whether violating this constraint should block auto-resolution.
    pub hard: bool,
}

/// Which branch of the pipeline produced a [`ResolveOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PathTaken {
    /// Resolved directly from similarity matching, no LLM call.
    FastPath,
    /// Fell through to the LLM decomposer for reasoning.
    ReasoningPath,
}

/// The result of resolving a single customer message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResolveOutput {
    /// Correlates this output back to the inbound request.
    pub request_id: RequestId,
    /// One or more ranked intents; more than one iff `is_compound`.
    pub resolved_intents: Vec<ResolvedIntent>,
    /// Whether the compound detector flagged this message as multi-intent.
    pub is_compound: bool,
    /// Entities extracted from the source text.
    pub entities: Vec<Entity>,
    /// Constraints surfaced during extraction or reasoning.
    pub constraints: Vec<Constraint>,
    /// `min(confidence)` across `resolved_intents`, or `0.0` if empty.
    pub confidence_summary: f64,
    /// Whether this resolution should be routed to a human agent.
    pub requires_human: bool,
    /// Why `requires_human` was set, if it was.
    pub requires_human_reason: Option<String>,
    /// Ordered log of reasoning steps, populated only on the reasoning path.
    pub reasoning_trace: Vec<String>,
    /// Wall-clock time spent resolving, in milliseconds.
    pub processing_time_ms: u64,
    /// Which branch produced this output.
    pub path_taken: PathTaken,
}

/// A single seed example in the vector catalog.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentCatalogEntry {
    /// Stable identifier for this catalog entry.
    pub id: Uuid,
    /// The intent code this example is evidence for.
    pub intent_code: String,
    /// Top-level category this intent belongs to.
    pub category: String,
    /// The example customer message text.
    pub example_text: String,
    /// L2-normalized embedding of `example_text`.
    pub embedding: Vec<f32>,
}

/// Subscription tier controlling a tenant's default rate limits and batch
/// ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// 20 req/min, burst 5, max batch 10, 2 websockets.
    Free,
    /// 60 req/min, burst 15, max batch 100, 10 websockets.
    Starter,
    /// 200 req/min, burst 50, max batch 500, 50 websockets.
    Professional,
    /// 1,000 req/min, burst 200, max batch 2,000, 500 websockets.
    Enterprise,
}

/// The default rate-limit and ceiling values for a [`Tier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDefaults {
    /// Sustained requests-per-minute budget.
    pub requests_per_minute: u32,
    /// Token bucket burst capacity.
    pub burst: u32,
    /// Maximum number of items accepted in a single batch submission.
    pub max_batch_size: usize,
    /// Maximum number of concurrent websocket connections (reserved; the
    /// websocket surface itself is out of scope here).
    pub max_websockets: u32,
}

impl Tier {
    /// The built-in defaults for this tier, before any per-tenant override.
    #[must_use]
    pub fn defaults(&self) -> TierDefaults {
        match self {
            Self::Free => TierDefaults {
                requests_per_minute: 20,
                burst: 5,
                max_batch_size: 10,
                max_websockets: 2,
            },
            Self::Starter => TierDefaults {
                requests_per_minute: 60,
                burst: 15,
                max_batch_size: 100,
                max_websockets: 10,
            },
            Self::Professional => TierDefaults {
                requests_per_minute: 200,
                burst: 50,
                max_batch_size: 500,
                max_websockets: 50,
            },
            Self::Enterprise => TierDefaults {
                requests_per_minute: 1_000,
                burst: 200,
                max_batch_size: 2_000,
                max_websockets: 500,
            },
        }
    }
}

/// Per-tenant overrides of tier defaults and feature flags.
///
/// A fixed, explicit whitelist rather than free-form JSON: unknown keys
/// are rejected at deserialization rather than silently ignored, per the
/// preference for typed overrides over a free-form config blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct TenantOverrides {
    /// Overrides `TierDefaults::requests_per_minute`.
    pub requests_per_minute: Option<u32>,
    /// Overrides `TierDefaults::burst`.
    pub burst_size: Option<u32>,
    /// Overrides `TierDefaults::max_batch_size`.
    pub max_batch_size: Option<usize>,
    /// Overrides `TierDefaults::max_websockets`.
    pub max_websocket_connections: Option<u32>,
    /// Disables the similarity fast path; every request takes the
    /// reasoning path. `None` defers to the tier default (enabled).
    pub fast_path_enabled: Option<bool>,
    /// Disables the LLM reasoning path; low-confidence or compound
    /// requests fall back to the matcher's top-1 with `requires_human`.
    pub reasoning_path_enabled: Option<bool>,
    /// Disables batch submission for this tenant.
    pub batch_processing_enabled: Option<bool>,
    /// Disables websocket connections for this tenant (reserved; the
    /// websocket surface itself is out of scope here).
    pub websocket_enabled: Option<bool>,
    /// Number of rate-limit tokens a reasoning-path call costs (default 3).
    pub reasoning_path_token_cost: Option<u32>,
}

/// A registered tenant of the intent resolution service.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TenantConfig {
    /// Stable tenant identifier.
    pub tenant_id: Uuid,
    /// Display name.
    pub name: String,
    /// Opaque API key used to authenticate requests for this tenant.
    pub api_key: String,
    /// Subscription tier.
    pub tier: Tier,
    /// Whether the tenant may currently make requests.
    pub is_active: bool,
    /// Per-tenant overrides of tier defaults and feature flags.
    #[serde(default)]
    pub overrides: TenantOverrides,
    /// When this tenant was created.
    pub created_at: DateTime<Utc>,
}

impl TenantConfig {
    /// Effective requests-per-minute limit after applying any override.
    #[must_use]
    pub fn requests_per_minute(&self) -> u32 {
        self.overrides
            .requests_per_minute
            .unwrap_or(self.tier.defaults().requests_per_minute)
    }

    /// Effective burst capacity after applying any override.
    #[must_use]
    pub fn burst(&self) -> u32 {
        self.overrides
            .burst_size
            .unwrap_or(self.tier.defaults().burst)
    }

    /// Effective max batch size after applying any override.
    #[must_use]
    pub fn max_batch_size(&self) -> usize {
        self.overrides
            .max_batch_size
            .unwrap_or(self.tier.defaults().max_batch_size)
    }

    /// Effective max websocket connections after applying any override.
    #[must_use]
    pub fn max_websocket_connections(&self) -> u32 {
        self.overrides
            .max_websocket_connections
            .unwrap_or(self.tier.defaults().max_websockets)
    }

    /// Whether the similarity fast path is enabled for this tenant
    /// (default: enabled).
    #[must_use]
    pub fn fast_path_enabled(&self) -> bool {
        self.overrides.fast_path_enabled.unwrap_or(true)
    }

    /// Whether the LLM reasoning path is enabled for this tenant
    /// (default: enabled).
    #[must_use]
    pub fn reasoning_path_enabled(&self) -> bool {
        self.overrides.reasoning_path_enabled.unwrap_or(true)
    }

    /// Whether batch submission is enabled for this tenant (default: enabled).
    #[must_use]
    pub fn batch_processing_enabled(&self) -> bool {
        self.overrides.batch_processing_enabled.unwrap_or(true)
    }

    /// Effective reasoning-path token budget, defaulting to 3.
    #[must_use]
    pub fn reasoning_path_token_cost(&self) -> u32 {
        self.overrides.reasoning_path_token_cost.unwrap_or(3)
    }
}

/// Lifecycle state of a submitted [`BatchJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Accepted, waiting for a worker slot.
    Queued,
    /// At least one item has started processing.
    Running,
    /// All items processed (some may have failed individually).
    Completed,
    /// The job itself failed outright (not to be confused with individual
    /// item failures, which are recorded per-item).
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

/// The outcome of resolving a single item within a batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchResultItem {
    /// Caller-supplied identifier for this item, echoed back verbatim.
    pub item_id: String,
    /// Whether this item resolved successfully.
    pub success: bool,
    /// The resolution, if `success`.
    pub result: Option<ResolveOutput>,
    /// The error, if not `success`.
    pub error: Option<IntentError>,
    /// When this item finished processing.
    pub processed_at: DateTime<Utc>,
}

/// A batch resolution job submitted by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchJob {
    /// Stable identifier for this job.
    pub job_id: Uuid,
    /// The tenant that submitted this job.
    pub tenant_id: Uuid,
    /// Current lifecycle state.
    pub status: BatchStatus,
    /// Total number of items submitted.
    pub total_items: usize,
    /// Number of items processed so far (success or failure).
    pub processed_items: usize,
    /// Number of items that failed.
    pub failed_items: usize,
    /// When the job was accepted.
    pub created_at: DateTime<Utc>,
    /// When the first item started processing.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Optional webhook to notify on progress/completion.
    pub webhook_url: Option<String>,
    /// Shared secret used to HMAC-sign webhook payloads.
    pub webhook_secret: Option<String>,
    /// Per-item results, appended as items complete.
    pub results: Vec<BatchResultItem>,
    /// Outcome of the terminal-state webhook delivery, if one was
    /// configured. `None` until the job reaches a terminal state or if
    /// no `webhook_url` was supplied.
    pub webhook_delivery: Option<WebhookDeliveryStatus>,
}

/// Outcome of attempting to deliver a job's terminal-state webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookDeliveryStatus {
    /// The webhook POST succeeded (2xx) within the retry budget.
    Delivered,
    /// All retry attempts were exhausted without a 2xx response.
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn confidence_tier_boundaries_are_inclusive_at_the_floor() {
        assert_eq!(ConfidenceTier::from_score(0.85), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(0.8499), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(0.60), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(0.5999), ConfidenceTier::Low);
    }

    #[test]
    fn tier_overrides_win_over_defaults() {
        let tenant = TenantConfig {
            tenant_id: Uuid::nil(),
            name: "acme".into(),
            api_key: "key".into(),
            tier: Tier::Free,
            is_active: true,
            overrides: TenantOverrides {
                requests_per_minute: Some(999),
                ..Default::default()
            },
            created_at: Utc::now(),
        };
        assert_eq!(tenant.requests_per_minute(), 999);
        assert_eq!(tenant.burst(), Tier::Free.defaults().burst);
        assert_eq!(tenant.reasoning_path_token_cost(), 3);
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    proptest::proptest! {
        #[test]
        fn confidence_tier_boundaries_are_total_and_consistent(score in -1.0f64..2.0) {
            let tier = ConfidenceTier::from_score(score);
            match tier {
                ConfidenceTier::High => prop_assert!(score >= 0.85),
                ConfidenceTier::Medium => prop_assert!((0.60..0.85).contains(&score)),
                ConfidenceTier::Low => prop_assert!(score < 0.60),
            }
        }
    }
}
