//! Catalog item types
//!
//! Items are created during catalog ingestion (external to this engine)
//! and are read-only here. An update is modeled as delete + reinsert.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A manufactured catalog item
///
/// `identity_key` is the unique business identifier (product/tag code)
/// and is the deduplication key across the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Unique product code, e.g. "T-100"
    pub identity_key: String,
    /// Searchable description, e.g. "Black Cotton Woven Tag"
    pub text: String,
    /// Pre-computed embedding vector
    pub embedding: Vec<f32>,
    /// Free-form metadata (stock quantity, size, brand, ...)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CatalogItem {
    /// Create a new catalog item
    pub fn new(
        identity_key: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            identity_key: identity_key.into(),
            text: text.into(),
            embedding,
            metadata: HashMap::new(),
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
