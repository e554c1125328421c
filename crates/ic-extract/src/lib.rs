// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Pure-function entity extraction and message signal scoring.
//!
//! [`extract`] never fails and never calls out of process: on malformed
//! input it returns empty lists and zeroed scores rather than an error,
//! matching the "entity extraction errors are swallowed" propagation
//! policy the rest of the pipeline relies on.

use ic_core::{Entity, EntityType};
use regex::Regex;
use std::sync::OnceLock;

/// The result of extracting entities and scoring signals from one message.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Extracted entities, non-overlapping within each [`EntityType`].
    pub entities: Vec<Entity>,
    /// Weighted-lexicon sentiment score in `[-1.0, 1.0]` (negative = bad).
    pub sentiment_score: f64,
    /// Urgency score in `[0.0, 1.0]`.
    pub urgency_score: f64,
    /// Frustration score in `[0.0, 1.0]`.
    pub frustration_score: f64,
    /// `true` iff this message should be prioritized for human attention.
    pub priority_flag: bool,
    /// The lexicon hits that drove the sentiment/urgency/frustration scores,
    /// for trace/explainability purposes.
    pub sentiment_signals: Vec<String>,
}

struct Span {
    entity_type: EntityType,
    value: String,
    raw_span: String,
    start: usize,
    end: usize,
    confidence: f64,
}

fn re_order_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)#?\b(ORD-[A-Z0-9]{3,12}|[0-9]{5,12})\b").unwrap())
}

fn re_tracking() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(1Z[0-9A-Z]{16}|[0-9]{12,22})\b").unwrap())
}

fn re_money() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\s?[0-9]+(?:\.[0-9]{2})?").unwrap())
}

fn re_email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").unwrap()
    })
}

fn re_phone() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap())
}

fn re_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec)\.?\s+\d{1,2}(st|nd|rd|th)?(,?\s+\d{4})?\b|\b\d{1,2}/\d{1,2}/\d{2,4}\b",
        )
        .unwrap()
    })
}

fn re_deadline() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bby\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday|tomorrow|tonight|end of (day|week|month)|[a-z]+\s+\d{1,2})\b|\bdeadline\b|\bneeds? to arrive by\b").unwrap()
    })
}

fn re_quantity() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(\d+)\s*(items?|units?|pieces?|pairs?|boxes?)\b").unwrap())
}

fn re_address() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b\d{1,6}\s+[A-Za-z0-9.'\s]{2,30}\b(street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|court|ct|way|place|pl)\b\.?(,?\s*(apt|unit|suite|ste)\s*#?\s*[A-Za-z0-9-]+)?",
        )
        .unwrap()
    })
}

fn re_person_name_cue() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(my name is|this is|i'?m|i am)\s+([A-Z][a-z]+(?:\s[A-Z][a-z]+)?)").unwrap()
    })
}

const SIZES: &[&str] = &["xs", "small", "s", "medium", "m", "large", "l", "xl", "xxl", "2xl", "3xl"];
const COLORS: &[&str] = &[
    "black", "white", "red", "blue", "green", "yellow", "purple", "pink", "orange", "gray", "grey",
    "brown", "navy", "beige", "tan", "gold", "silver",
];
const CARRIERS: &[&str] = &["ups", "usps", "fedex", "dhl", "amazon logistics", "canada post", "royal mail"];
const REASONS: &[(&str, &str)] = &[
    ("damaged", "damaged"),
    ("broken", "damaged"),
    ("shattered", "damaged"),
    ("cracked", "damaged"),
    ("defective", "defective"),
    ("doesn't work", "defective"),
    ("does not work", "defective"),
    ("wrong size", "wrong_size"),
    ("too small", "wrong_size"),
    ("too big", "wrong_size"),
    ("too large", "wrong_size"),
    ("wrong item", "wrong_item"),
    ("wrong color", "wrong_item"),
    ("not as described", "not_as_described"),
    ("changed my mind", "changed_mind"),
    ("no longer need", "changed_mind"),
];
const DAMAGE_SEVERITY: &[(&str, &str)] = &[
    ("shattered", "severe"),
    ("destroyed", "severe"),
    ("completely broken", "severe"),
    ("cracked", "moderate"),
    ("dented", "moderate"),
    ("scratched", "minor"),
    ("scuffed", "minor"),
];
const DEFECT_CATEGORIES: &[(&str, &str)] = &[
    ("doesn't turn on", "electrical"),
    ("won't turn on", "electrical"),
    ("stopped working", "functional"),
    ("doesn't work", "functional"),
    ("missing parts", "missing_parts"),
    ("missing piece", "missing_parts"),
    ("stitching", "craftsmanship"),
    ("seam", "craftsmanship"),
];
const BRANDS: &[&str] = &["nike", "adidas", "apple", "samsung", "sony", "levi's", "levis"];

const URGENCY_WORDS: &[(&str, f64)] = &[
    ("urgent", 0.9),
    ("asap", 0.9),
    ("immediately", 0.85),
    ("right away", 0.8),
    ("as soon as possible", 0.85),
    ("emergency", 0.8),
    ("critical", 0.7),
];
const FRUSTRATION_WORDS: &[(&str, f64)] = &[
    ("furious", 0.95),
    ("terrible", 0.85),
    ("disappointed", 0.7),
    ("disappointing", 0.7),
    ("awful", 0.85),
    ("ridiculous", 0.8),
    ("unacceptable", 0.85),
    ("frustrated", 0.75),
    ("angry", 0.8),
    ("worst", 0.8),
];
const NEGATIONS: &[&str] = &["not", "n't", "never", "no"];

fn normalized_text_lower(text: &str) -> String {
    text.to_lowercase()
}

fn push_regex_hits(
    text: &str,
    re: &Regex,
    entity_type: EntityType,
    confidence: f64,
    normalize: impl Fn(&str) -> String,
    out: &mut Vec<Span>,
) {
    for m in re.find_iter(text) {
        out.push(Span {
            entity_type,
            value: normalize(m.as_str()),
            raw_span: m.as_str().to_string(),
            start: m.start(),
            end: m.end(),
            confidence,
        });
    }
}

/// Find the first case-insensitive occurrence of `pattern` (a lowercase
/// ASCII literal) in `text` at or after `from_byte`, scanning by `char`
/// so the returned byte range always indexes `text` itself rather than
/// a separately-lowercased copy whose byte length can differ (e.g.
/// `to_lowercase()` on `'İ'` grows from 2 bytes to 3).
fn find_case_insensitive(text: &str, pattern: &str, from_byte: usize) -> Option<(usize, usize)> {
    let pat_chars: Vec<char> = pattern.chars().collect();
    let chars: Vec<(usize, char)> = text.char_indices().filter(|&(b, _)| b >= from_byte).collect();
    if pat_chars.is_empty() || chars.len() < pat_chars.len() {
        return None;
    }
    'windows: for i in 0..=(chars.len() - pat_chars.len()) {
        for (k, &pat_c) in pat_chars.iter().enumerate() {
            let (_, c) = chars[i + k];
            if !c.to_lowercase().eq(pat_c.to_lowercase()) {
                continue 'windows;
            }
        }
        let start_byte = chars[i].0;
        let end_byte = chars
            .get(i + pat_chars.len())
            .map_or(text.len(), |&(b, _)| b);
        return Some((start_byte, end_byte));
    }
    None
}

fn push_lexicon_hits(
    text: &str,
    lexicon: &[&str],
    entity_type: EntityType,
    confidence: f64,
    out: &mut Vec<Span>,
) {
    for &word in lexicon {
        let mut from_byte = 0;
        while let Some((abs_start, abs_end)) = find_case_insensitive(text, word, from_byte) {
            let boundary_ok = {
                let before_ok = text[..abs_start]
                    .chars()
                    .next_back()
                    .is_none_or(|c| !c.is_alphanumeric());
                let after_ok = text[abs_end..]
                    .chars()
                    .next()
                    .is_none_or(|c| !c.is_alphanumeric());
                before_ok && after_ok
            };
            if boundary_ok {
                out.push(Span {
                    entity_type,
                    value: word.to_string(),
                    raw_span: text[abs_start..abs_end].to_string(),
                    start: abs_start,
                    end: abs_end,
                    confidence,
                });
            }
            from_byte = if abs_end > abs_start { abs_end } else { abs_start + 1 };
        }
    }
}

fn push_mapped_lexicon_hits(
    text: &str,
    lexicon: &[(&str, &str)],
    entity_type: EntityType,
    confidence: f64,
    out: &mut Vec<Span>,
) {
    for &(phrase, canonical) in lexicon {
        if let Some((start, end)) = find_case_insensitive(text, phrase, 0) {
            out.push(Span {
                entity_type,
                value: canonical.to_string(),
                raw_span: text[start..end].to_string(),
                start,
                end,
                confidence,
            });
        }
    }
}

/// Resolve overlapping spans within a single [`EntityType`]: prefer the
/// longer span, then the earlier start.
fn resolve_overlaps(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by(|a, b| {
        let len_a = a.end - a.start;
        let len_b = b.end - b.start;
        len_b.cmp(&len_a).then(a.start.cmp(&b.start))
    });

    let mut kept: Vec<Span> = Vec::new();
    'outer: for span in spans {
        for k in &kept {
            if span.start < k.end && k.start < span.end {
                continue 'outer;
            }
        }
        kept.push(span);
    }
    kept.sort_by_key(|s| s.start);
    kept
}

/// Extract entities and sentiment/urgency signals from one customer message.
///
/// Never fails: a malformed or empty input yields an [`ExtractionResult`]
/// with empty lists and zeroed scores rather than an error.
#[must_use]
pub fn extract(text: &str) -> ExtractionResult {
    if text.is_empty() {
        return ExtractionResult::default();
    }

    let lower = normalized_text_lower(text);
    let mut raw_spans: Vec<Span> = Vec::new();

    push_regex_hits(text, re_order_id(), EntityType::OrderId, 0.97, |m| {
        m.trim_start_matches('#').to_uppercase()
    }, &mut raw_spans);
    push_regex_hits(text, re_tracking(), EntityType::TrackingNumber, 0.96, |m| {
        m.to_uppercase()
    }, &mut raw_spans);
    push_regex_hits(text, re_money(), EntityType::Money, 0.98, str::to_string, &mut raw_spans);
    push_regex_hits(text, re_email(), EntityType::Email, 0.98, |m| m.to_lowercase(), &mut raw_spans);
    push_regex_hits(text, re_phone(), EntityType::Phone, 0.95, str::to_string, &mut raw_spans);
    push_regex_hits(text, re_date(), EntityType::Date, 0.9, |m| m.to_lowercase(), &mut raw_spans);
    push_regex_hits(text, re_deadline(), EntityType::Deadline, 0.7, |m| m.to_lowercase(), &mut raw_spans);
    push_regex_hits(text, re_quantity(), EntityType::Quantity, 0.9, |m| m.to_lowercase(), &mut raw_spans);
    push_regex_hits(text, re_address(), EntityType::Address, 0.85, str::to_string, &mut raw_spans);

    if let Some(caps) = re_person_name_cue().captures(text) {
        if let Some(name) = caps.get(2) {
            raw_spans.push(Span {
                entity_type: EntityType::PersonName,
                value: name.as_str().to_string(),
                raw_span: name.as_str().to_string(),
                start: name.start(),
                end: name.end(),
                confidence: 0.65,
            });
        }
    }

    push_lexicon_hits(text, SIZES, EntityType::Size, 0.82, &mut raw_spans);
    push_lexicon_hits(text, COLORS, EntityType::Color, 0.82, &mut raw_spans);
    push_lexicon_hits(text, CARRIERS, EntityType::Carrier, 0.85, &mut raw_spans);
    push_lexicon_hits(text, BRANDS, EntityType::Brand, 0.8, &mut raw_spans);
    push_mapped_lexicon_hits(text, REASONS, EntityType::Reason, 0.8, &mut raw_spans);
    push_mapped_lexicon_hits(text, DAMAGE_SEVERITY, EntityType::DamageSeverity, 0.75, &mut raw_spans);
    push_mapped_lexicon_hits(text, DEFECT_CATEGORIES, EntityType::DefectCategory, 0.75, &mut raw_spans);

    // Entities are resolved for overlap independently per type.
    let mut by_type: std::collections::HashMap<EntityType, Vec<Span>> = std::collections::HashMap::new();
    for span in raw_spans {
        by_type.entry(span.entity_type).or_default().push(span);
    }

    let mut entities: Vec<Entity> = Vec::new();
    for (_, spans) in by_type {
        for span in resolve_overlaps(spans) {
            entities.push(Entity {
                entity_type: span.entity_type,
                value: span.value,
                raw_span: span.raw_span,
                start_pos: span.start,
                end_pos: span.end,
                confidence: span.confidence,
            });
        }
    }
    entities.sort_by_key(|e| e.start_pos);

    let (sentiment_score, urgency_score, frustration_score, sentiment_signals) = score_sentiment(&lower);
    let priority_flag = urgency_score >= 0.7 || frustration_score >= 0.7;

    ExtractionResult {
        entities,
        sentiment_score,
        urgency_score,
        frustration_score,
        priority_flag,
        sentiment_signals,
    }
}

fn score_sentiment(lower: &str) -> (f64, f64, f64, Vec<String>) {
    let mut urgency: f64 = 0.0;
    let mut frustration: f64 = 0.0;
    let mut signals = Vec::new();

    for &(word, weight) in URGENCY_WORDS {
        if lower.contains(word) {
            urgency = urgency.max(weight);
            signals.push(format!("urgency:{word}"));
        }
    }
    for &(word, weight) in FRUSTRATION_WORDS {
        if lower.contains(word) {
            frustration = frustration.max(weight);
            signals.push(format!("frustration:{word}"));
        }
    }

    let negated = NEGATIONS.iter().any(|n| lower.contains(n));
    let mut sentiment = frustration - urgency * 0.2;
    if negated && frustration > 0.0 {
        // A negated complaint phrase ("not terrible") reads as neutral,
        // not as negative as the bare lexicon hit would suggest.
        sentiment *= 0.5;
        signals.push("negation".to_string());
    }
    let sentiment_score = (-sentiment).clamp(-1.0, 1.0);

    (sentiment_score, urgency, frustration, signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_input_never_fails() {
        let r = extract("");
        assert!(r.entities.is_empty());
        assert_eq!(r.urgency_score, 0.0);
        assert_eq!(r.frustration_score, 0.0);
        assert!(!r.priority_flag);
    }

    #[test]
    fn extracts_and_normalizes_order_id() {
        let r = extract("Where is my order #ord-98765?");
        let hit = r.entities.iter().find(|e| e.entity_type == EntityType::OrderId);
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().value, "ORD-98765");
    }

    #[test]
    fn extracts_deadline_and_damage_reason() {
        let r = extract("My vase arrived shattered, I need a refund by Friday.");
        assert!(r.entities.iter().any(|e| e.entity_type == EntityType::Reason && e.value == "damaged"));
        assert!(r.entities.iter().any(|e| e.entity_type == EntityType::Deadline));
        assert!(r.entities.iter().any(|e| e.entity_type == EntityType::DamageSeverity && e.value == "severe"));
    }

    #[test]
    fn priority_flag_set_on_urgent_or_furious_language() {
        let r = extract("This is urgent, I need this fixed ASAP!");
        assert!(r.urgency_score >= 0.7);
        assert!(r.priority_flag);
    }

    #[test]
    fn priority_flag_unset_on_neutral_text() {
        let r = extract("Can you tell me when my order will arrive?");
        assert!(!r.priority_flag);
    }

    #[test]
    fn overlapping_spans_prefer_longer_then_earlier() {
        // "ORD-98765" should win over any shorter embedded numeric match.
        let r = extract("Order ORD-98765 please");
        let order_hits: Vec<_> = r.entities.iter().filter(|e| e.entity_type == EntityType::OrderId).collect();
        assert_eq!(order_hits.len(), 1);
        assert_eq!(order_hits[0].value, "ORD-98765");
    }

    #[test]
    fn confidences_are_calibrated_within_bands() {
        let r = extract("Contact me at jane@example.com or call 555-123-4567");
        for e in &r.entities {
            assert!(e.confidence >= 0.6 && e.confidence <= 0.99);
        }
    }

    #[test]
    fn extracts_address_and_person_name() {
        let r = extract("Hi, this is Jane Doe, please ship to 742 Evergreen Terrace.");
        assert!(r.entities.iter().any(|e| e.entity_type == EntityType::PersonName && e.value == "Jane Doe"));
        assert!(r.entities.iter().any(|e| e.entity_type == EntityType::Address));
    }

    #[test]
    fn multiple_order_ids_are_both_extracted() {
        let r = extract("I want to return ORD-1111 and where is ORD-2222?");
        let ids: Vec<_> = r
            .entities
            .iter()
            .filter(|e| e.entity_type == EntityType::OrderId)
            .map(|e| e.value.clone())
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"ORD-1111".to_string()));
        assert!(ids.contains(&"ORD-2222".to_string()));
    }

    proptest::proptest! {
        #[test]
        fn extract_never_panics_on_arbitrary_text(text in "\\PC{0,500}") {
            let r = extract(&text);
            prop_assert!(r.sentiment_score >= -1.0 && r.sentiment_score <= 1.0);
            prop_assert!(r.urgency_score >= 0.0 && r.urgency_score <= 1.0);
            prop_assert!(r.frustration_score >= 0.0 && r.frustration_score <= 1.0);
            for e in &r.entities {
                prop_assert!(e.confidence >= 0.0 && e.confidence <= 1.0);
                prop_assert!(e.start_pos <= e.end_pos);
                prop_assert!(e.end_pos <= text.len());
            }
        }
    }
}
