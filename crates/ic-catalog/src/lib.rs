// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Vector-similarity catalog of seed intent examples.
//!
//! Backed by an exact cosine scan, which is accurate at the catalog
//! sizes (< 10k entries) this service is scoped to. The trait is
//! object-safe so an HNSW- or IVF-backed implementation can be dropped
//! in later without touching callers.

use async_trait::async_trait;
use ic_core::IntentCatalogEntry;
use ic_embed::{similarity, Embedder};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{OnceLock, RwLock};
use uuid::Uuid;

/// Errors specific to catalog loading and maintenance.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog seed file could not be read.
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The catalog seed file was not valid JSON for its expected shape.
    #[error("failed to parse catalog file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A top-level key in the seed file did not match
    /// `[A-Z_]+\.[A-Z_]+`.
    #[error("catalog seed file {path} has an invalid intent code key: {key}")]
    InvalidIntentCode {
        /// Path of the offending seed file.
        path: String,
        /// The malformed key.
        key: String,
    },
}

fn re_intent_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z_]+\.[A-Z_]+$").unwrap())
}

/// One scored hit returned by [`VectorCatalog::search`].
#[derive(Debug, Clone)]
pub struct CatalogHit {
    /// The matched catalog entry.
    pub entry: IntentCatalogEntry,
    /// Cosine similarity between the query and `entry.embedding`.
    pub score: f32,
}

/// A searchable store of seed intent examples.
#[async_trait]
pub trait VectorCatalog: Send + Sync {
    /// Insert or replace a single entry.
    async fn insert(&self, entry: IntentCatalogEntry);

    /// Insert or replace many entries at once.
    async fn insert_batch(&self, entries: Vec<IntentCatalogEntry>);

    /// Return up to `top_k` entries most similar to `query_embedding`
    /// with similarity at least `min_similarity`, ranked by descending
    /// cosine similarity.
    async fn search(&self, query_embedding: &[f32], top_k: usize, min_similarity: f32) -> Vec<CatalogHit>;

    /// Count of entries per intent code, for operator visibility.
    async fn counts_by_intent(&self) -> HashMap<String, usize>;

    /// Remove every entry for the given intent code. Returns the number
    /// of entries removed.
    async fn delete_by_intent(&self, intent_code: &str) -> usize;

    /// Remove every entry in the catalog.
    async fn clear(&self);

    /// Lightweight liveness check; never fails for the in-memory backend.
    async fn ping(&self) -> bool;
}

#[derive(Default)]
struct Table {
    entries: HashMap<Uuid, IntentCatalogEntry>,
}

/// In-memory, exact-scan [`VectorCatalog`] implementation.
///
/// `refresh` stages a brand-new table off to the side and swaps it in
/// behind a single write-lock acquisition, so concurrent readers either
/// see the entire old catalog or the entire new one — never a partial
/// mix. This is a hard requirement, not a best-effort optimization.
pub struct InMemoryCatalog {
    table: RwLock<Table>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    /// Construct an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table::default()),
        }
    }

    /// Load the operator-facing seed format (a JSON
    /// object `{ "<CATEGORY.INTENT>": ["example1", ...] }`), embed each
    /// example, and atomically replace the catalog contents.
    ///
    /// `clear()` + `load()` happen as one staged-then-swapped write-lock
    /// acquisition, so concurrent readers see either the whole old
    /// catalog or the whole new one, never a partial mix.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`]/[`CatalogError::Parse`] if the file
    /// cannot be read or parsed, or [`CatalogError::InvalidIntentCode`]
    /// if a key does not match `[A-Z_]+\.[A-Z_]+`.
    pub async fn refresh(
        &self,
        embedder: &dyn Embedder,
        path: impl AsRef<Path>,
    ) -> Result<usize, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let seed: HashMap<String, Vec<String>> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        let mut staged = Table::default();
        for (intent_code, examples) in seed {
            if !re_intent_code().is_match(&intent_code) {
                return Err(CatalogError::InvalidIntentCode {
                    path: path.display().to_string(),
                    key: intent_code,
                });
            }
            let category = intent_code
                .split_once('.')
                .map_or_else(|| intent_code.clone(), |(c, _)| c.to_string());
            for example_text in examples {
                let embedding = embedder.embed(&example_text).await;
                let id = Uuid::new_v4();
                staged.entries.insert(
                    id,
                    IntentCatalogEntry {
                        id,
                        intent_code: intent_code.clone(),
                        category: category.clone(),
                        example_text,
                        embedding,
                    },
                );
            }
        }

        let count = staged.entries.len();
        let mut guard = self.table.write().expect("catalog lock poisoned");
        *guard = staged;
        tracing::info!(entries = count, "catalog refreshed from seed file");
        Ok(count)
    }
}

#[async_trait]
impl VectorCatalog for InMemoryCatalog {
    async fn insert(&self, entry: IntentCatalogEntry) {
        let mut guard = self.table.write().expect("catalog lock poisoned");
        guard.entries.insert(entry.id, entry);
    }

    async fn insert_batch(&self, entries: Vec<IntentCatalogEntry>) {
        let mut guard = self.table.write().expect("catalog lock poisoned");
        for entry in entries {
            guard.entries.insert(entry.id, entry);
        }
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize, min_similarity: f32) -> Vec<CatalogHit> {
        let guard = self.table.read().expect("catalog lock poisoned");
        let mut hits: Vec<CatalogHit> = guard
            .entries
            .values()
            .map(|entry| CatalogHit {
                entry: entry.clone(),
                score: similarity(query_embedding, &entry.embedding),
            })
            .filter(|hit| hit.score >= min_similarity)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        hits
    }

    async fn counts_by_intent(&self) -> HashMap<String, usize> {
        let guard = self.table.read().expect("catalog lock poisoned");
        let mut counts = HashMap::new();
        for entry in guard.entries.values() {
            *counts.entry(entry.intent_code.clone()).or_insert(0) += 1;
        }
        counts
    }

    async fn delete_by_intent(&self, intent_code: &str) -> usize {
        let mut guard = self.table.write().expect("catalog lock poisoned");
        let before = guard.entries.len();
        guard.entries.retain(|_, e| e.intent_code != intent_code);
        before - guard.entries.len()
    }

    async fn clear(&self) {
        let mut guard = self.table.write().expect("catalog lock poisoned");
        guard.entries.clear();
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(intent: &str, vec: Vec<f32>) -> IntentCatalogEntry {
        IntentCatalogEntry {
            id: Uuid::new_v4(),
            intent_code: intent.to_string(),
            category: "orders".to_string(),
            example_text: format!("example for {intent}"),
            embedding: vec,
        }
    }

    #[tokio::test]
    async fn search_ranks_by_descending_similarity() {
        let cat = InMemoryCatalog::new();
        cat.insert(entry("wismo", vec![1.0, 0.0])).await;
        cat.insert(entry("return", vec![0.0, 1.0])).await;
        cat.insert(entry("partial", vec![0.7, 0.7])).await;

        let hits = cat.search(&[1.0, 0.0], 3, 0.0).await;
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].entry.intent_code, "wismo");
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[1].score >= hits[2].score);
    }

    #[tokio::test]
    async fn top_k_truncates() {
        let cat = InMemoryCatalog::new();
        for i in 0..10 {
            cat.insert(entry(&format!("intent_{i}"), vec![1.0, i as f32])).await;
        }
        let hits = cat.search(&[1.0, 0.0], 3, 0.0).await;
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn search_respects_min_similarity_floor() {
        let cat = InMemoryCatalog::new();
        cat.insert(entry("wismo", vec![1.0, 0.0])).await;
        cat.insert(entry("return", vec![0.0, 1.0])).await;

        let hits = cat.search(&[1.0, 0.0], 10, 0.5).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.intent_code, "wismo");
    }

    #[tokio::test]
    async fn refresh_from_seed_file_embeds_examples_and_counts_histogram() {
        let cat = InMemoryCatalog::new();
        cat.insert(entry("stale", vec![1.0, 0.0])).await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("seed.json");
        let seed = serde_json::json!({
            "ORDER_STATUS.WISMO": ["where is my order", "track my package"],
            "RETURN_EXCHANGE.RETURN_INITIATE": ["i want to return this"],
        });
        std::fs::write(&file, serde_json::to_string(&seed).unwrap()).unwrap();

        let embedder = ic_embed::HashingEmbedder::new();
        let n = cat.refresh(&embedder, &file).await.unwrap();
        assert_eq!(n, 3);

        let counts = cat.counts_by_intent().await;
        assert!(!counts.contains_key("stale"));
        assert_eq!(counts.get("ORDER_STATUS.WISMO"), Some(&2));
        assert_eq!(counts.get("RETURN_EXCHANGE.RETURN_INITIATE"), Some(&1));
    }

    #[tokio::test]
    async fn refresh_rejects_malformed_intent_code_keys() {
        let cat = InMemoryCatalog::new();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.json");
        let seed = serde_json::json!({ "not-a-valid-key": ["hi"] });
        std::fs::write(&file, serde_json::to_string(&seed).unwrap()).unwrap();

        let embedder = ic_embed::HashingEmbedder::new();
        let err = cat.refresh(&embedder, &file).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidIntentCode { .. }));
    }

    #[tokio::test]
    async fn delete_by_intent_removes_only_matching_entries() {
        let cat = InMemoryCatalog::new();
        cat.insert(entry("a", vec![1.0, 0.0])).await;
        cat.insert(entry("a", vec![0.9, 0.1])).await;
        cat.insert(entry("b", vec![0.0, 1.0])).await;

        let removed = cat.delete_by_intent("a").await;
        assert_eq!(removed, 2);
        let counts = cat.counts_by_intent().await;
        assert_eq!(counts.get("a"), None);
        assert_eq!(counts.get("b"), Some(&1));
    }
}
