//! Error types shared across the match engine

use thiserror::Error;

/// Match engine errors
///
/// `RerankerUnavailable` and `KeywordIndex` are recovered inside the
/// pipeline (degraded-mode, logged); `InvalidInput` and `IndexUnavailable`
/// surface to the caller. Invariant violations (confidence outside [0,1]
/// after calibration, duplicate keys in a final result) are programming
/// errors and assert instead of returning a variant.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Keyword index error: {0}")]
    KeywordIndex(String),

    #[error("Reranker unavailable: {0}")]
    RerankerUnavailable(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Model error: {0}")]
    Model(String),
}

/// Result alias for match engine operations
pub type Result<T> = std::result::Result<T, Error>;
