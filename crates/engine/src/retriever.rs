//! Hybrid retriever
//!
//! Runs dense and sparse search in parallel and fuses the two score
//! sets into one ranked candidate pool. Each set is min-max normalized
//! before weighting so the bounded cosine scores and unbounded BM25
//! scores are comparable.

use std::collections::HashMap;
use std::sync::Arc;

use ordermatch_config::constants::fusion;
use ordermatch_config::MatchingConfig;
use ordermatch_core::{Candidate, EmbeddingIndex, Error, IndexHit, Result};

use crate::embedder::Embedder;
use crate::keyword_index::{KeywordHit, KeywordIndex};

/// Fusion weights for the hybrid score
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Weight of the normalized semantic score (0.0 - 1.0)
    pub semantic_weight: f32,
    /// Weight of the normalized keyword score (0.0 - 1.0)
    pub keyword_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            semantic_weight: fusion::SEMANTIC_WEIGHT,
            keyword_weight: fusion::KEYWORD_WEIGHT,
        }
    }
}

impl From<&MatchingConfig> for FusionConfig {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            semantic_weight: config.semantic_weight,
            keyword_weight: config.keyword_weight,
        }
    }
}

/// Min-max normalize a score set into [0.0, 1.0]
///
/// A singleton or zero-variance set maps to all 1.0: one hit carries no
/// relative ranking information, so it is treated as the best available.
pub(crate) fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }

    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

/// Hybrid retriever combining dense and sparse search
pub struct HybridRetriever {
    config: FusionConfig,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn EmbeddingIndex>,
    keyword_index: Option<Arc<KeywordIndex>>,
}

impl HybridRetriever {
    /// Create a semantic-only retriever
    pub fn new(
        config: FusionConfig,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn EmbeddingIndex>,
    ) -> Self {
        Self {
            config,
            embedder,
            index,
            keyword_index: None,
        }
    }

    /// Attach a keyword index for the sparse side
    pub fn with_keyword_index(mut self, index: Arc<KeywordIndex>) -> Self {
        self.keyword_index = Some(index);
        self
    }

    /// Retrieve the fused candidate pool, best hybrid score first
    ///
    /// The embedding index is required: its failure fails the query.
    /// The keyword index is best-effort: its failure degrades the query
    /// to semantic-only with a warning.
    pub async fn search(
        &self,
        query: &str,
        n_candidates: usize,
        filters: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<Candidate>> {
        // Embedding inference is CPU-bound; keep it off the async workers
        let embedder = Arc::clone(&self.embedder);
        let query_owned = query.to_string();
        let query_embedding = tokio::task::spawn_blocking(move || embedder.embed(&query_owned))
            .await
            .map_err(|e| Error::Embedding(format!("Embedding task failed: {}", e)))??;

        let dense_future = self.index.query(&query_embedding, n_candidates, filters);

        let keyword_index = self.keyword_index.clone();
        let query_owned = query.to_string();
        let sparse_future = async move {
            if let Some(keyword) = keyword_index {
                tokio::task::spawn_blocking(move || keyword.search(&query_owned, n_candidates))
                    .await
                    .map_err(|e| Error::KeywordIndex(format!("Keyword task failed: {}", e)))?
            } else {
                Ok::<Vec<KeywordHit>, Error>(Vec::new())
            }
        };

        let (dense_result, sparse_result) = tokio::join!(dense_future, sparse_future);

        let dense_hits = dense_result?;
        let sparse_hits = match sparse_result {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "Keyword search failed, degrading to semantic-only");
                Vec::new()
            },
        };

        // Metadata filters only exist on the dense side; keep the sparse
        // set consistent by intersecting it against the filtered keys.
        let sparse_hits: Vec<KeywordHit> = if filters.map_or(false, |f| !f.is_empty()) {
            let allowed: std::collections::HashSet<&str> =
                dense_hits.iter().map(|h| h.identity_key.as_str()).collect();
            sparse_hits
                .into_iter()
                .filter(|h| allowed.contains(h.identity_key.as_str()))
                .collect()
        } else {
            sparse_hits
        };

        Ok(self.fuse(dense_hits, sparse_hits, n_candidates))
    }

    fn fuse(
        &self,
        dense: Vec<IndexHit>,
        sparse: Vec<KeywordHit>,
        n_candidates: usize,
    ) -> Vec<Candidate> {
        let dense_norm = min_max_normalize(
            &dense.iter().map(|h| h.score).collect::<Vec<f32>>(),
        );
        let sparse_norm = min_max_normalize(
            &sparse.iter().map(|h| h.score).collect::<Vec<f32>>(),
        );

        struct Entry {
            text: String,
            semantic_raw: f32,
            keyword_raw: f32,
            semantic_norm: f32,
            keyword_norm: f32,
        }

        let mut order: Vec<String> = Vec::new();
        let mut entries: HashMap<String, Entry> = HashMap::new();

        for (hit, norm) in dense.into_iter().zip(dense_norm) {
            // Each side is already deduplicated per identity key; a repeat
            // would indicate an index bug, keep the best-ranked one.
            entries.entry(hit.identity_key.clone()).or_insert_with(|| {
                order.push(hit.identity_key.clone());
                Entry {
                    text: hit.text,
                    semantic_raw: hit.score,
                    keyword_raw: 0.0,
                    semantic_norm: norm,
                    keyword_norm: 0.0,
                }
            });
        }

        for (hit, norm) in sparse.into_iter().zip(sparse_norm) {
            match entries.get_mut(&hit.identity_key) {
                Some(entry) => {
                    if norm > entry.keyword_norm {
                        entry.keyword_raw = hit.score;
                        entry.keyword_norm = norm;
                    }
                },
                None => {
                    order.push(hit.identity_key.clone());
                    entries.insert(
                        hit.identity_key,
                        Entry {
                            text: hit.text,
                            semantic_raw: 0.0,
                            keyword_raw: hit.score,
                            semantic_norm: 0.0,
                            keyword_norm: norm,
                        },
                    );
                },
            }
        }

        let mut candidates: Vec<Candidate> = order
            .into_iter()
            .filter_map(|key| entries.remove(&key).map(|e| (key, e)))
            .map(|(identity_key, entry)| {
                let hybrid_score = self.config.semantic_weight * entry.semantic_norm
                    + self.config.keyword_weight * entry.keyword_norm;
                Candidate {
                    identity_key,
                    text: entry.text,
                    semantic_score: entry.semantic_raw,
                    keyword_score: entry.keyword_raw,
                    hybrid_score,
                    rerank_score: None,
                    final_confidence: hybrid_score,
                }
            })
            .collect();

        // Stable sort keeps the dense-then-sparse insertion order for ties
        candidates.sort_by(|a, b| {
            b.hybrid_score
                .partial_cmp(&a.hybrid_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(n_candidates);
        candidates
    }
}
