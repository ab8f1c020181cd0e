//! Embedding generator trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus pure helper functions for vector serialization and similarity
//! computation shared by the vector engines.
//!
//! Embedding is infallible by contract: a degraded (zero) vector is
//! preferable to losing a document, so implementations map any internal
//! failure to [`zero_vector`] instead of propagating an error.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Trait for embedding generators.
///
/// Every returned vector has exactly [`dims`](Embedder::dims) components.
/// [`embed_batch`](Embedder::embed_batch) applies
/// [`embed`](Embedder::embed) to every element in input order and
/// preserves a 1:1 length correspondence (an empty input yields an empty
/// output).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a single text. Never fails: internal errors degrade to a
    /// zero vector of length [`dims`](Embedder::dims).
    async fn embed(&self, text: &str) -> Vec<f32>;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await);
        }
        vectors
    }
}

/// Deterministic hash-based embedding generator.
///
/// Expands a SHA-256 counter stream over the input text into `dims`
/// components, each bounded in `[-1.0, 1.0]`. Identical input always
/// yields an identical vector. This is a placeholder that satisfies the
/// [`Embedder`] contract for tests and offline use; it carries no
/// semantic signal beyond exact-text identity.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Vec<f32> {
        let mut components = Vec::with_capacity(self.dims);
        let mut counter: u64 = 0;

        'fill: loop {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();

            for pair in digest.chunks_exact(2) {
                if components.len() == self.dims {
                    break 'fill;
                }
                let raw = u16::from_le_bytes([pair[0], pair[1]]);
                components.push((f32::from(raw) / f32::from(u16::MAX)) * 2.0 - 1.0);
            }
            counter += 1;
        }

        components
    }
}

/// A zero vector of the given dimensionality — the degraded embedding
/// used when no real one can be produced.
pub fn zero_vector(dims: usize) -> Vec<f32> {
    vec![0.0; dims]
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// a BLOB of `vec.len() × 4` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values
/// from the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("the same text").await;
        let b = embedder.embed("the same text").await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_embed_dimension_stable() {
        let embedder = HashEmbedder::new(384);
        assert_eq!(embedder.embed("hello").await.len(), 384);
        assert_eq!(embedder.embed("").await.len(), 384);
    }

    #[tokio::test]
    async fn test_embed_components_bounded() {
        let embedder = HashEmbedder::new(128);
        for v in embedder.embed("bounds check").await {
            assert!((-1.0..=1.0).contains(&v), "component out of range: {v}");
        }
    }

    #[tokio::test]
    async fn test_embed_distinct_inputs_differ() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("first").await;
        let b = embedder.embed("second").await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_embed_identical_text_is_self_similar() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed("a passage about retrieval").await;
        let b = embedder.embed("a passage about retrieval").await;
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order_and_length() {
        let embedder = HashEmbedder::new(32);
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let vectors = embedder.embed_batch(&texts).await;
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], embedder.embed("one").await);
        assert_eq!(vectors[2], embedder.embed("three").await);
    }

    #[tokio::test]
    async fn test_embed_batch_empty() {
        let embedder = HashEmbedder::new(32);
        let vectors = embedder.embed_batch(&[]).await;
        assert!(vectors.is_empty());
    }

    #[test]
    fn test_zero_vector() {
        let v = zero_vector(5);
        assert_eq!(v.len(), 5);
        assert!(v.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector_is_orthogonal_to_everything() {
        let z = zero_vector(4);
        let v = vec![0.5, -0.5, 0.25, 1.0];
        assert_eq!(cosine_similarity(&z, &v), 0.0);
    }
}
