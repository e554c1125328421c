// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Text embedding for the intent resolution core.
//!
//! Ships one embedder: a deterministic feature-hashing bag-of-n-grams
//! model. It has no network or model-file dependency, so the catalog and
//! matcher crates are fully testable offline. The [`Embedder`] trait is
//! object-safe so a real sentence-transformer backend can be swapped in
//! later without touching callers.

use async_trait::async_trait;

/// Fixed output dimensionality for every embedding produced in this
/// workspace. Chosen to be large enough that hash collisions between
/// unrelated n-grams are rare for the MVP taxonomy's catalog size.
pub const EMBEDDING_DIM: usize = 384;

/// Produces embeddings for customer message text.
///
/// Implementations MUST be deterministic within a single process run:
/// embedding the same text twice must yield identical vectors. Vectors
/// are not required to be stable across model versions or processes.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text into an L2-normalized vector of
    /// length [`EMBEDDING_DIM`].
    async fn embed(&self, text: &str) -> Vec<f32>;

    /// Embed a batch of texts. The default implementation embeds each
    /// text independently; implementations with a vectorized batch path
    /// (e.g. a real model backend) should override this.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await);
        }
        out
    }
}

/// Cosine similarity between two equal-length vectors.
///
/// When both inputs are already L2-normalized (as every [`Embedder`] in
/// this workspace guarantees), this reduces to a plain dot product.
///
/// # Examples
///
/// ```
/// use ic_embed::similarity;
/// let a = vec![1.0_f32, 0.0];
/// let b = vec![1.0_f32, 0.0];
/// assert!((similarity(&a, &b) - 1.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "similarity: mismatched vector lengths");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Lowercase, strip punctuation to whitespace, and split on whitespace.
fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    cleaned.split_whitespace().map(str::to_owned).collect()
}

/// FNV-1a, good enough for deterministic bucket assignment, not for
/// cryptographic use.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Deterministic feature-hashing embedder.
///
/// Hashes unigrams and bigrams of the (lowercased, punctuation-stripped)
/// input into a fixed [`EMBEDDING_DIM`]-wide bucket space, accumulates
/// signed counts via the hash's sign bit (the standard feature-hashing
/// trick to keep collisions unbiased in expectation), then L2-normalizes.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashingEmbedder;

impl HashingEmbedder {
    /// Construct a new hashing embedder. Stateless; cheap to clone or share.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut v = vec![0.0_f32; EMBEDDING_DIM];
        if tokens.is_empty() {
            return v;
        }

        let mut accumulate = |gram: &str| {
            let h = fnv1a(gram.as_bytes());
            let bucket = (h % EMBEDDING_DIM as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        };

        for tok in &tokens {
            accumulate(tok);
        }
        for pair in tokens.windows(2) {
            accumulate(&format!("{} {}", pair[0], pair[1]));
        }

        normalize(v)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Vec<f32> {
        self.embed_sync(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let e = HashingEmbedder::new();
        let a = e.embed("Where is my order #12345?").await;
        let b = e.embed("Where is my order #12345?").await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embedding_is_l2_normalized() {
        let e = HashingEmbedder::new();
        let v = e.embed("I want to return this damaged item").await;
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector_without_panicking() {
        let e = HashingEmbedder::new();
        let v = e.embed("").await;
        assert_eq!(v.len(), EMBEDDING_DIM);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn distinct_messages_usually_differ() {
        let e = HashingEmbedder::new();
        let a = e.embed("where is my package").await;
        let b = e.embed("I want a refund for a damaged item").await;
        assert!(similarity(&a, &b) < 0.99);
    }

    #[tokio::test]
    async fn batch_matches_individual_embeds() {
        let e = HashingEmbedder::new();
        let texts = vec!["hello world".to_string(), "return my order".to_string()];
        let batch = e.embed_batch(&texts).await;
        for (text, vec) in texts.iter().zip(batch.iter()) {
            assert_eq!(&e.embed(text).await, vec);
        }
    }

    proptest::proptest! {
        #[test]
        fn embed_sync_never_panics_and_stays_normalized(text in "\\PC*") {
            let e = HashingEmbedder::new();
            let v = e.embed_sync(&text);
            prop_assert_eq!(v.len(), EMBEDDING_DIM);
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            prop_assert!((norm - 1.0).abs() < 1e-3 || norm == 0.0);
            prop_assert!(v.iter().all(|x| x.is_finite()));
        }

        #[test]
        fn similarity_of_identical_vectors_is_their_norm_squared(
            dims in proptest::collection::vec(-1.0f32..1.0, 1..16)
        ) {
            let expected: f32 = dims.iter().map(|x| x * x).sum();
            prop_assert!((similarity(&dims, &dims) - expected).abs() < 1e-4);
        }
    }
}
