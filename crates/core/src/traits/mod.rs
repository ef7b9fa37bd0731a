//! Capability traits for the match engine
//!
//! All pluggable backends implement these traits so the pipeline can be
//! wired explicitly at construction time (no ambient globals) and tested
//! with in-process fakes:
//!
//! ```text
//! Retrieval:
//!   - EmbeddingIndex: nearest-neighbor lookup over catalog embeddings
//!
//! Reranking:
//!   - Reranker: cross-encoder scoring of (query, candidate text) pairs
//!
//! Routing:
//!   - AvailabilityCheck: caller-supplied stock predicate gating
//!     auto-approval
//! ```

mod availability;
mod index;
mod reranker;

pub use availability::AvailabilityCheck;
pub use index::{EmbeddingIndex, IndexHit};
pub use reranker::Reranker;
