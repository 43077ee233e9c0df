//! Embedding seam for the session index.
//!
//! Chunk texts and retrieval queries both pass through one
//! [`EmbeddingProvider`], so their vectors are comparable. The HTTP-backed
//! providers live in the `learning-harness` crate; this module only holds
//! the trait and the vector helpers the SQLite index needs.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Bytes per stored vector component.
const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Turns chunk texts into vectors.
///
/// `embed_texts` must return exactly one vector per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier recorded in the index metadata.
    fn model_name(&self) -> &str;
    /// Vector length this provider produces.
    fn dims(&self) -> usize;
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed one retrieval query.
pub async fn embed_query(provider: &dyn EmbeddingProvider, query: &str) -> Result<Vec<f32>> {
    provider
        .embed_texts(&[query.to_owned()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("{} returned no vector for the query", provider.model_name()))
}

/// Pack a vector into the little-endian byte layout of the `embedding` column.
///
/// ```rust
/// use learning_harness_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let stored = vec_to_blob(&[0.5, -1.0]);
/// assert_eq!(stored.len(), 8);
/// assert_eq!(blob_to_vec(&stored), vec![0.5, -1.0]);
/// ```
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Unpack an `embedding` column value. Trailing partial components are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(F32_BYTES)
        .filter_map(|bytes| bytes.try_into().ok().map(f32::from_le_bytes))
        .collect()
}

/// Cosine similarity in `[-1, 1]`.
///
/// Mismatched lengths, empty input and zero vectors all score `0.0`, so a
/// malformed stored vector ranks below any real match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (dot, sq_a, sq_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, na, nb), (x, y)| {
            (d + x * y, na + x * x, nb + y * y)
        });
    let magnitude = (sq_a * sq_b).sqrt();
    if magnitude < f32::EPSILON {
        0.0
    } else {
        dot / magnitude
    }
}
