// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Signals-based compound-intent detection.
//!
//! Never LLM-driven: every signal here is a cheap regex or count over
//! text already in hand (the raw message, the extractor's entities, and
//! the matcher's candidates).

use ic_core::Entity;
use ic_match::MatchResult;
use regex::Regex;
use std::sync::OnceLock;

/// Similarity floor for a matcher candidate to count toward the
/// category-mix and multi-intent signals.
pub const HIGH_SIMILARITY_FLOOR: f32 = 0.70;

/// One named signal the detector observed, retained for the reasoning
/// trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The message segmented into two or more sentences.
    MultiSentence,
    /// A conjunction tying two action clauses was found.
    Conjunction,
    /// Two or more distinct category prefixes appeared among
    /// high-similarity matches.
    CategoryMix,
    /// Two or more order ids were extracted.
    MultipleOrderIds,
}

impl Signal {
    /// Human-readable label for this signal, used in trace output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::MultiSentence => "multi_sentence",
            Self::Conjunction => "conjunction",
            Self::CategoryMix => "category_mix",
            Self::MultipleOrderIds => "multiple_order_ids",
        }
    }
}

/// The outcome of running the compound detector over one message.
#[derive(Debug, Clone)]
pub struct CompoundOutcome {
    /// Whether the message is judged to carry more than one intent.
    pub is_compound: bool,
    /// Every signal that fired, in detection order.
    pub signals: Vec<Signal>,
}

fn re_conjunction() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\band also\b|\bplus\b|\bas well as\b|\bin addition\b|\balso need\b|\band i\b|\bi also\b")
            .unwrap()
    })
}

fn re_abbreviation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(mr|mrs|ms|dr|st|ave|no|etc|e\.g|i\.e)\.$").unwrap())
}

/// Segment `text` into sentences on `. ! ?`, collapsing common
/// abbreviation boundaries (e.g. "Mr." does not end a sentence).
#[must_use]
pub fn segment_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        if c == '.' || c == '!' || c == '?' {
            let trimmed = current.trim();
            let looks_like_abbreviation = re_abbreviation().is_match(trimmed);
            let next_is_lowercase = chars
                .get(i + 1..)
                .and_then(|rest| rest.iter().find(|ch| !ch.is_whitespace()))
                .is_some_and(|ch| ch.is_lowercase());

            if !looks_like_abbreviation && !next_is_lowercase {
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Run the compound detector over one message.
///
/// `candidates` should be the matcher's ranked output for the same
/// message (used for the category-mix signal); `entities` should be the
/// extractor's output (used for the multiple-order-ids signal).
#[must_use]
pub fn detect(text: &str, candidates: &[MatchResult], entities: &[Entity]) -> CompoundOutcome {
    let mut signals = Vec::new();

    let sentences = segment_sentences(text);
    let multi_sentence = sentences.len() >= 2;
    if multi_sentence {
        signals.push(Signal::MultiSentence);
    }

    let conjunction = re_conjunction().is_match(text);
    if conjunction {
        signals.push(Signal::Conjunction);
    }

    let high_sim_categories: std::collections::HashSet<&str> = candidates
        .iter()
        .filter(|c| c.similarity >= HIGH_SIMILARITY_FLOOR)
        .map(|c| c.category.as_str())
        .collect();
    let category_mix = high_sim_categories.len() >= 2;
    if category_mix {
        signals.push(Signal::CategoryMix);
    }

    let order_id_count = entities
        .iter()
        .filter(|e| e.entity_type == ic_core::EntityType::OrderId)
        .count();
    let multiple_order_ids = order_id_count >= 2;
    if multiple_order_ids {
        signals.push(Signal::MultipleOrderIds);
    }

    let distinct_high_sim_intents = candidates
        .iter()
        .filter(|c| c.similarity >= HIGH_SIMILARITY_FLOOR)
        .count();
    let two_or_more_high_sim_distinct_categories = category_mix && distinct_high_sim_intents >= 2;

    let is_compound = category_mix
        || (conjunction && multi_sentence)
        || two_or_more_high_sim_distinct_categories;

    CompoundOutcome { is_compound, signals }
}
