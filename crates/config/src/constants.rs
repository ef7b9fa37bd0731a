//! Centralized constants for the order match engine
//!
//! Single source of truth for score weights, decision thresholds and
//! service defaults. Settings defaults and engine component defaults both
//! pull from here so file/env overrides stay consistent with code.

/// Score fusion weights
///
/// The 0.7/0.3 retrieval split and the 0.4/0.6 calibration split are
/// tuned starting points, not measured optima; deployments are expected
/// to override them through `Settings`.
pub mod fusion {
    /// Weight of the normalized semantic score in the hybrid fusion
    pub const SEMANTIC_WEIGHT: f32 = 0.7;

    /// Weight of the normalized keyword (BM25) score in the hybrid fusion
    pub const KEYWORD_WEIGHT: f32 = 0.3;

    /// Weight of the hybrid score in the final confidence blend
    pub const HYBRID_WEIGHT: f32 = 0.4;

    /// Weight of the rerank score in the final confidence blend
    pub const RERANK_WEIGHT: f32 = 0.6;
}

/// Decision routing thresholds
pub mod routing {
    /// Minimum confidence for auto-approval (inclusive)
    pub const AUTO_APPROVE_THRESHOLD: f32 = 0.90;

    /// Minimum confidence for human review (inclusive); below this the
    /// customer is asked to clarify
    pub const HUMAN_REVIEW_THRESHOLD: f32 = 0.60;
}

/// Retrieval defaults
pub mod retrieval {
    /// Default number of final results per query
    pub const DEFAULT_TOP_K: usize = 5;

    /// Candidate pool multiplier: n_candidates = multiplier * n_results
    /// when the request does not set an explicit pool size
    pub const CANDIDATE_MULTIPLIER: usize = 4;

    /// Minimum raw similarity for an embedding index hit; lower hits are
    /// absent from the result set, enabling the empty "no match" outcome
    pub const MIN_SEMANTIC_SCORE: f32 = 0.4;
}

/// Embedding defaults
pub mod embedding {
    /// Default embedding dimension
    pub const DEFAULT_DIM: usize = 384;

    /// Maximum sequence length for model-backed embedding/reranking
    pub const MAX_SEQ_LEN: usize = 256;
}

/// Service endpoints (defaults for local development)
pub mod endpoints {
    /// Qdrant vector store endpoint
    pub const QDRANT_DEFAULT: &str = "http://127.0.0.1:6333";

    /// Cross-encoder rerank service endpoint
    pub const RERANKER_DEFAULT: &str = "http://127.0.0.1:8580";
}

/// Timeouts (in milliseconds)
pub mod timeouts {
    /// Budget for one rerank pass before degrading to hybrid-only scores
    pub const RERANK_TIMEOUT_MS: u64 = 2_000;
}
