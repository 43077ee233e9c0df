//! Retrieval abstraction over a semantic index.
//!
//! The [`Retriever`] trait is the only thing the report synthesizer and
//! feedback reviser know about an index, so SQLite-backed session indexes
//! and test doubles are interchangeable.

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::IndexedChunk;

/// Nearest-neighbour search over indexed chunks.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` chunks most similar to `query`, best first.
    ///
    /// Ties keep insertion order, so results are stable for a given index
    /// state.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<IndexedChunk>>;
}

/// Rank `(chunk, vector)` pairs against a query vector and keep the top `k`.
///
/// Uses a stable sort, so equally similar chunks stay in insertion order.
pub fn rank_by_similarity<'a, I>(query_vec: &[f32], entries: I, k: usize) -> Vec<IndexedChunk>
where
    I: IntoIterator<Item = (&'a IndexedChunk, &'a [f32])>,
{
    let mut scored: Vec<(f32, &IndexedChunk)> = entries
        .into_iter()
        .map(|(chunk, vector)| (cosine_similarity(query_vec, vector), chunk))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(k).map(|(_, c)| c.clone()).collect()
}
