// SPDX-License-Identifier: MIT OR Apache-2.0
use ic_core::Entity;
use serde::{Deserialize, Serialize};

/// The closed MVP intent taxonomy the decomposer's output is validated
/// against. A response naming anything outside this set fails validation
/// and is never retried.
pub const CLOSED_TAXONOMY: &[&str] = &[
    "ORDER_STATUS.WISMO",
    "ORDER_STATUS.DELIVERY_ESTIMATE",
    "ORDER_MODIFY.CANCEL_ORDER",
    "ORDER_MODIFY.CHANGE_ADDRESS",
    "RETURN_EXCHANGE.RETURN_INITIATE",
    "RETURN_EXCHANGE.EXCHANGE_REQUEST",
    "RETURN_EXCHANGE.REFUND_STATUS",
    "COMPLAINT.DAMAGED_ITEM",
];

/// One hint from the similarity matcher, passed to the decomposer as
/// context rather than ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchHint {
    /// Candidate intent code.
    pub intent_code: String,
    /// The matcher's similarity score for this candidate.
    pub similarity: f32,
}

/// Input to [`crate::Decomposer::decompose`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposeInput {
    /// The raw customer message.
    pub raw_text: String,
    /// Entities already extracted by `ic-extract`.
    pub extracted_entities: Vec<Entity>,
    /// Candidate intents from `ic-match`, offered as context.
    pub match_hints: Vec<MatchHint>,
    /// The tenant's subscription tier, if relevant to prompt shaping.
    pub customer_tier: Option<String>,
    /// Intents resolved earlier in a multi-turn conversation, if any.
    pub previous_intents: Vec<String>,
}

/// One intent named in a decomposer response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposedIntent {
    /// Must be a member of [`CLOSED_TAXONOMY`].
    pub intent_code: String,
    /// Model-reported confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Supporting evidence strings, in the order the model produced them.
    pub evidence: Vec<String>,
    /// Free-text constraint strings; the pipeline maps these onto typed
    /// `Constraint`s heuristically (see `ic-pipeline`).
    pub constraints: Vec<String>,
}

/// Output of [`crate::Decomposer::decompose`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposeOutput {
    /// The intents the model identified.
    pub intents: Vec<DecomposedIntent>,
    /// Whether the model itself judged the message to carry more than
    /// one intent.
    pub is_compound: bool,
    /// Free-text explanation of the model's reasoning, for the trace.
    pub reasoning: String,
    /// Whether the model could not confidently resolve the message and
    /// wants the customer to clarify.
    pub requires_clarification: bool,
    /// The question to ask, if `requires_clarification`.
    pub clarification_question: Option<String>,
}

impl DecomposeOutput {
    /// `true` iff every intent code in `self.intents` is in
    /// [`CLOSED_TAXONOMY`].
    #[must_use]
    pub fn has_valid_taxonomy(&self) -> bool {
        self.intents
            .iter()
            .all(|i| CLOSED_TAXONOMY.contains(&i.intent_code.as_str()))
    }
}
