// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Embeds a customer message and matches it against the intent catalog.
//!
//! Combines [`ic_embed::Embedder`] and [`ic_catalog::VectorCatalog`]:
//! embed, retrieve top-k, max-pool per intent code, and classify a
//! confidence tier for downstream branch decisions.

use ic_catalog::VectorCatalog;
use ic_core::ConfidenceTier;
use ic_embed::Embedder;
use std::collections::HashMap;

/// Default number of catalog hits retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

/// One ranked intent candidate from the similarity matcher.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Full `CATEGORY.INTENT` code.
    pub intent_code: String,
    /// Category prefix of `intent_code`.
    pub category: String,
    /// Max-pooled cosine similarity across retrieved hits for this intent.
    pub similarity: f32,
    /// The catalog example text that produced the best hit for this intent.
    pub matched_example: String,
}

/// The outcome of matching one message against the catalog.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Ranked candidates, descending by `similarity`.
    pub candidates: Vec<MatchResult>,
    /// Confidence tier derived from the top-1/top-2 gap rule.
    pub tier: ConfidenceTier,
}

impl MatchOutcome {
    /// The top-ranked candidate, if any.
    #[must_use]
    pub fn top1(&self) -> Option<&MatchResult> {
        self.candidates.first()
    }

    /// The second-ranked candidate, if any.
    #[must_use]
    pub fn top2(&self) -> Option<&MatchResult> {
        self.candidates.get(1)
    }

    /// `top1.similarity - top2.similarity`, or `top1.similarity` if there
    /// is no second candidate (an infinite gap, conceptually).
    #[must_use]
    pub fn gap(&self) -> f32 {
        match (self.top1(), self.top2()) {
            (Some(a), Some(b)) => a.similarity - b.similarity,
            (Some(a), None) => a.similarity,
            (None, _) => 0.0,
        }
    }
}

/// Classify a top1/top2 pair into a [`ConfidenceTier`] per the matcher's
/// branch rule: `HIGH` if `top1 >= 0.85` and the gap is `>= 0.05`;
/// `MEDIUM` if `top1` is in `[0.60, 0.85)` or the gap is `< 0.05`; `LOW`
/// otherwise.
#[must_use]
pub fn classify_tier(top1: Option<f32>, gap: f32) -> ConfidenceTier {
    let Some(top1) = top1 else {
        return ConfidenceTier::Low;
    };
    if top1 >= 0.85 {
        if gap >= 0.05 {
            ConfidenceTier::High
        } else {
            ConfidenceTier::Medium
        }
    } else if (0.60..0.85).contains(&top1) {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    }
}

/// Embeds `text` and matches it against `catalog`, returning ranked
/// candidates and a confidence tier.
pub async fn match_text(
    embedder: &dyn Embedder,
    catalog: &dyn VectorCatalog,
    text: &str,
    top_k: usize,
) -> MatchOutcome {
    let query = embedder.embed(text).await;
    let hits = catalog.search(&query, top_k, 0.0).await;

    // Max-pool similarity per intent code; track the argmax hit's example.
    let mut best: HashMap<String, (f32, String, String)> = HashMap::new();
    for hit in hits {
        let entry = best
            .entry(hit.entry.intent_code.clone())
            .or_insert((f32::MIN, String::new(), String::new()));
        if hit.score > entry.0 {
            *entry = (hit.score, hit.entry.example_text.clone(), hit.entry.category.clone());
        }
    }

    let mut candidates: Vec<MatchResult> = best
        .into_iter()
        .map(|(intent_code, (similarity, matched_example, category))| MatchResult {
            intent_code,
            category,
            similarity,
            matched_example,
        })
        .collect();
    candidates.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));

    let top1 = candidates.first().map(|c| c.similarity);
    let gap = match (candidates.first(), candidates.get(1)) {
        (Some(a), Some(b)) => a.similarity - b.similarity,
        (Some(a), None) => a.similarity,
        (None, _) => 0.0,
    };
    let tier = classify_tier(top1, gap);

    MatchOutcome { candidates, tier }
}
