//! Reranker trait

use async_trait::async_trait;

use crate::error::Result;

/// Cross-encoder relevance scoring over (query, candidate text) pairs
///
/// Scores each pair jointly and independently of any stored vectors.
/// Batching for throughput is an implementation detail; it must not change
/// which pairs are scored or their individual scores. An unreachable
/// model/service signals `Error::RerankerUnavailable` — the caller
/// degrades to hybrid-only confidence rather than failing the query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score every (query, text) pair, returning one score in [0,1] per
    /// input pair, in input order.
    async fn score(&self, query: &str, pairs: &[(String, String)]) -> Result<Vec<f32>>;

    /// Get reranker name for logging
    fn name(&self) -> &str;
}
