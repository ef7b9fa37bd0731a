//! Query request type and validation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

fn default_quantity() -> u32 {
    1
}

/// A free-text match request against the catalog
///
/// `n_results` and `n_candidates` both resolve from configuration when
/// unset: `n_results` from the configured result count and
/// `n_candidates` (the over-fetch pool pulled before reranking) from the
/// candidate multiplier. When both are set explicitly, `n_candidates`
/// must be at least `n_results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Free-text order request, e.g. "500 black cotton tags"
    pub text: String,
    /// Final number of candidates to return (resolved from config if None)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_results: Option<usize>,
    /// Candidate pool size before reranking (resolved from config if None)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_candidates: Option<usize>,
    /// Metadata equality filters applied during retrieval
    #[serde(default)]
    pub filters: HashMap<String, serde_json::Value>,
    /// Quantity the order asks for, fed into the availability check
    #[serde(default = "default_quantity")]
    pub requested_quantity: u32,
    /// Whole-pipeline deadline in milliseconds (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl QueryRequest {
    /// Create a request with configuration-resolved result sizing
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            n_results: None,
            n_candidates: None,
            filters: HashMap::new(),
            requested_quantity: default_quantity(),
            deadline_ms: None,
        }
    }

    /// Override the number of results to return
    pub fn with_results(mut self, n_results: usize) -> Self {
        self.n_results = Some(n_results);
        self
    }

    /// Override the candidate pool size
    pub fn with_candidate_pool(mut self, n_candidates: usize) -> Self {
        self.n_candidates = Some(n_candidates);
        self
    }

    /// Add a metadata equality filter
    pub fn with_filter(
        mut self,
        field: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    /// Set the requested quantity
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.requested_quantity = quantity;
        self
    }

    /// Attach a deadline to the whole pipeline
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Validate the request
    ///
    /// Empty/whitespace-only text, an explicit `n_results == 0` and an
    /// explicit candidate pool smaller than an explicit `n_results` are
    /// all `InvalidInput`. The pipeline re-checks the pool against the
    /// resolved result count when `n_results` comes from configuration.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidInput("query text is empty".to_string()));
        }
        if self.n_results == Some(0) {
            return Err(Error::InvalidInput("n_results must be at least 1".to_string()));
        }
        if let (Some(n_candidates), Some(n_results)) = (self.n_candidates, self.n_results) {
            if n_candidates < n_results {
                return Err(Error::InvalidInput(format!(
                    "n_candidates ({}) must be >= n_results ({})",
                    n_candidates, n_results
                )));
            }
        }
        Ok(())
    }
}
