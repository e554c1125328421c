// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::{DecomposeInput, DecomposeOutput, DecomposedIntent, Decomposer, DecomposerError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// A canned-output test double for [`Decomposer`].
///
/// Keyed by prompt prefix: the longest registered prefix that matches
/// `input.raw_text` (case-insensitively) wins. Falls back to a
/// low-confidence clarification response when nothing matches, so tests
/// never need to register a catch-all.
pub struct EchoDecomposer {
    canned: RwLock<HashMap<String, DecomposeOutput>>,
}

impl Default for EchoDecomposer {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoDecomposer {
    /// Construct an echo decomposer with no canned responses registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            canned: RwLock::new(HashMap::new()),
        }
    }

    /// Register a canned [`DecomposeOutput`] for a given prompt prefix.
    pub fn register(&self, prompt_prefix: impl Into<String>, output: DecomposeOutput) {
        let mut guard = self.canned.write().expect("echo decomposer lock poisoned");
        guard.insert(prompt_prefix.into().to_lowercase(), output);
    }

    fn clarification_fallback() -> DecomposeOutput {
        DecomposeOutput {
            intents: Vec::new(),
            is_compound: false,
            reasoning: "no canned response registered; low confidence".to_string(),
            requires_clarification: true,
            clarification_question: Some("Could you tell me more about what you need?".to_string()),
        }
    }
}

#[async_trait]
impl Decomposer for EchoDecomposer {
    async fn decompose(&self, input: DecomposeInput) -> Result<DecomposeOutput, DecomposerError> {
        let lower = input.raw_text.to_lowercase();
        let guard = self.canned.read().expect("echo decomposer lock poisoned");

        let best = guard
            .iter()
            .filter(|(prefix, _)| lower.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());

        Ok(best.map(|(_, out)| out.clone()).unwrap_or_else(Self::clarification_fallback))
    }
}

/// Build a simple single-intent canned output, for tests that just want
/// one intent back without constructing [`DecomposeOutput`] by hand.
#[must_use]
pub fn single_intent(
    intent_code: impl Into<String>,
    confidence: f64,
    evidence: Vec<String>,
) -> DecomposeOutput {
    DecomposeOutput {
        intents: vec![DecomposedIntent {
            intent_code: intent_code.into(),
            confidence,
            evidence,
            constraints: Vec::new(),
        }],
        is_compound: false,
        reasoning: "echoed canned single-intent response".to_string(),
        requires_clarification: false,
        clarification_question: None,
    }
}
