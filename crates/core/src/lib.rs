//! Core traits and types for the order match engine
//!
//! This crate provides the foundational types used across the workspace:
//! - Catalog and query types (`CatalogItem`, `QueryRequest`)
//! - Match output types (`Candidate`, `MatchResult`, `Decision`)
//! - Capability traits for pluggable backends (`EmbeddingIndex`,
//!   `Reranker`, `AvailabilityCheck`)
//! - Error types

pub mod catalog;
pub mod error;
pub mod query;
pub mod result;
pub mod traits;

pub use catalog::CatalogItem;
pub use error::{Error, Result};
pub use query::QueryRequest;
pub use result::{Candidate, Decision, MatchResult};

pub use traits::{AvailabilityCheck, EmbeddingIndex, IndexHit, Reranker};
