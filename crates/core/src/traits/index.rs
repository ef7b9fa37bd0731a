//! Embedding index trait

use async_trait::async_trait;
use std::collections::HashMap;

use crate::catalog::CatalogItem;
use crate::error::Result;

/// A nearest-neighbor hit from the embedding index
///
/// Carries the item text and metadata alongside the score so the reranker
/// can operate on (query, text) pairs without a second catalog lookup.
#[derive(Debug, Clone)]
pub struct IndexHit {
    /// Catalog item identity key
    pub identity_key: String,
    /// Raw similarity score (cosine or dot, backend-defined range)
    pub score: f32,
    /// Item description
    pub text: String,
    /// Item metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Vector index over catalog item embeddings
///
/// Queries are read-only and safe to issue concurrently from multiple
/// callers. Implementations fail with `Error::IndexUnavailable` when the
/// backing store cannot be reached; a hit below the backend's similarity
/// floor is absent from the result, not zero-scored.
#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// Insert catalog items. An existing item with the same identity key
    /// is replaced (delete + reinsert semantics).
    async fn add(&self, items: &[CatalogItem]) -> Result<()>;

    /// Return the k nearest items by similarity, best first, optionally
    /// restricted by metadata equality filters.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filters: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<IndexHit>>;
}
