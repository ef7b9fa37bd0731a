//! Embedding index backends
//!
//! Dense vector storage and similarity search. Two implementations of
//! the core `EmbeddingIndex` trait: an in-process brute-force index for
//! tests and small catalogs, and a Qdrant-backed index for production.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use qdrant_client::{
    qdrant::{
        value::Kind, Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance,
        FieldCondition, Filter, Match, PointId, PointStruct, PointsIdsList, SearchPointsBuilder,
        UpsertPointsBuilder, VectorParamsBuilder,
    },
    Qdrant,
};
use uuid::Uuid;

use ordermatch_config::constants::{endpoints, retrieval};
use ordermatch_core::{CatalogItem, EmbeddingIndex, Error, IndexHit, Result};

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Qdrant endpoint
    pub endpoint: String,
    /// Collection name
    pub collection: String,
    /// Vector dimension
    pub vector_dim: usize,
    /// Distance metric
    pub distance: VectorDistance,
    /// API key (optional)
    pub api_key: Option<String>,
    /// Minimum similarity for a hit; lower matches are dropped
    pub min_score: f32,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::QDRANT_DEFAULT.to_string(),
            collection: "catalog_items".to_string(),
            vector_dim: 384,
            distance: VectorDistance::Cosine,
            api_key: None,
            min_score: retrieval::MIN_SEMANTIC_SCORE,
        }
    }
}

impl From<&ordermatch_config::VectorStoreSettings> for VectorStoreConfig {
    fn from(s: &ordermatch_config::VectorStoreSettings) -> Self {
        Self {
            endpoint: s.endpoint.clone(),
            collection: s.collection.clone(),
            vector_dim: s.vector_dim,
            distance: s.distance.into(),
            api_key: s.api_key.clone(),
            min_score: retrieval::MIN_SEMANTIC_SCORE,
        }
    }
}

/// Distance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorDistance {
    Cosine,
    Euclidean,
    DotProduct,
}

impl From<ordermatch_config::DistanceMetric> for VectorDistance {
    fn from(d: ordermatch_config::DistanceMetric) -> Self {
        match d {
            ordermatch_config::DistanceMetric::Cosine => VectorDistance::Cosine,
            ordermatch_config::DistanceMetric::Euclidean => VectorDistance::Euclidean,
            ordermatch_config::DistanceMetric::Dot => VectorDistance::DotProduct,
        }
    }
}

impl From<VectorDistance> for Distance {
    fn from(d: VectorDistance) -> Self {
        match d {
            VectorDistance::Cosine => Distance::Cosine,
            VectorDistance::Euclidean => Distance::Euclid,
            VectorDistance::DotProduct => Distance::Dot,
        }
    }
}

/// In-process embedding index
///
/// Brute-force cosine search over catalog items held in memory. Adding
/// an item whose identity key already exists replaces the stored entry.
pub struct MemoryEmbeddingIndex {
    items: RwLock<Vec<CatalogItem>>,
    min_score: f32,
}

impl MemoryEmbeddingIndex {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            min_score: retrieval::MIN_SEMANTIC_SCORE,
        }
    }

    /// Index with a custom similarity floor (0.0 disables filtering)
    pub fn with_min_score(min_score: f32) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            min_score,
        }
    }

    /// Number of indexed items
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl Default for MemoryEmbeddingIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn matches_filters(
    metadata: &HashMap<String, serde_json::Value>,
    filters: &HashMap<String, serde_json::Value>,
) -> bool {
    filters.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

#[async_trait]
impl EmbeddingIndex for MemoryEmbeddingIndex {
    async fn add(&self, items: &[CatalogItem]) -> Result<()> {
        let mut store = self.items.write();
        for item in items {
            store.retain(|existing| existing.identity_key != item.identity_key);
            store.push(item.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filters: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<IndexHit>> {
        let store = self.items.read();

        let mut hits: Vec<IndexHit> = store
            .iter()
            .filter(|item| filters.map_or(true, |f| matches_filters(&item.metadata, f)))
            .map(|item| IndexHit {
                identity_key: item.identity_key.clone(),
                score: cosine_similarity(vector, &item.embedding),
                text: item.text.clone(),
                metadata: item.metadata.clone(),
            })
            .filter(|hit| hit.score >= self.min_score)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }
}

/// Qdrant-backed embedding index
///
/// Identity keys are arbitrary strings while Qdrant point ids must be
/// UUIDs or integers, so points are keyed by a v5 UUID derived from the
/// identity key and the key itself rides in the payload.
pub struct QdrantEmbeddingIndex {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl QdrantEmbeddingIndex {
    /// Connect and create the collection if missing
    pub async fn new(config: VectorStoreConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        let index = Self { client, config };
        index.ensure_collection().await?;
        Ok(index)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.config.collection).vectors_config(
                        VectorParamsBuilder::new(
                            self.config.vector_dim as u64,
                            Distance::from(self.config.distance),
                        ),
                    ),
                )
                .await
                .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        }

        Ok(())
    }

    fn point_id(identity_key: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, identity_key.as_bytes()).to_string()
    }

    /// Delete items by identity key
    pub async fn delete(&self, identity_keys: &[String]) -> Result<()> {
        let points: Vec<PointId> = identity_keys
            .iter()
            .map(|key| PointId::from(Self::point_id(key)))
            .collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.config.collection)
                    .points(PointsIdsList { ids: points }),
            )
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        Ok(())
    }

    /// Number of indexed points
    pub async fn count(&self) -> Result<u64> {
        let info = self
            .client
            .collection_info(&self.config.collection)
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        Ok(info
            .result
            .map(|r| r.points_count.unwrap_or(0))
            .unwrap_or(0))
    }
}

fn json_to_qdrant(value: &serde_json::Value) -> qdrant_client::qdrant::Value {
    match value {
        serde_json::Value::String(s) => s.clone().into(),
        serde_json::Value::Bool(b) => (*b).into(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else {
                n.as_f64().unwrap_or(0.0).into()
            }
        },
        other => other.to_string().into(),
    }
}

fn qdrant_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(d),
        _ => serde_json::Value::Null,
    }
}

fn filters_to_qdrant(filters: &HashMap<String, serde_json::Value>) -> Filter {
    use qdrant_client::qdrant::condition::ConditionOneOf;
    use qdrant_client::qdrant::r#match::MatchValue;

    let conditions: Vec<Condition> = filters
        .iter()
        .map(|(key, value)| {
            let match_value = match value {
                serde_json::Value::Bool(b) => MatchValue::Boolean(*b),
                serde_json::Value::Number(n) if n.is_i64() => {
                    MatchValue::Integer(n.as_i64().unwrap_or(0))
                },
                serde_json::Value::String(s) => MatchValue::Keyword(s.clone()),
                other => MatchValue::Keyword(other.to_string()),
            };
            Condition {
                condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                    key: key.clone(),
                    r#match: Some(Match {
                        match_value: Some(match_value),
                    }),
                    ..Default::default()
                })),
            }
        })
        .collect();

    Filter {
        must: conditions,
        ..Default::default()
    }
}

#[async_trait]
impl EmbeddingIndex for QdrantEmbeddingIndex {
    async fn add(&self, items: &[CatalogItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = items
            .iter()
            .map(|item| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("identity_key".to_string(), item.identity_key.clone().into());
                payload.insert("text".to_string(), item.text.clone().into());

                for (k, v) in &item.metadata {
                    payload.insert(k.clone(), json_to_qdrant(v));
                }

                PointStruct::new(
                    Self::point_id(&item.identity_key),
                    item.embedding.clone(),
                    payload,
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points))
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filters: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<IndexHit>> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.config.collection, vector.to_vec(), k as u64)
                .with_payload(true)
                .score_threshold(self.config.min_score);

        if let Some(f) = filters.filter(|f| !f.is_empty()) {
            search_builder = search_builder.filter(filters_to_qdrant(f));
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        let hits: Vec<IndexHit> = results
            .result
            .into_iter()
            .map(|point| {
                let mut identity_key = String::new();
                let mut text = String::new();
                let mut metadata = HashMap::new();

                for (k, v) in point.payload {
                    match k.as_str() {
                        "identity_key" => {
                            if let Some(Kind::StringValue(s)) = v.kind {
                                identity_key = s;
                            }
                        },
                        "text" => {
                            if let Some(Kind::StringValue(s)) = v.kind {
                                text = s;
                            }
                        },
                        _ => {
                            metadata.insert(k, qdrant_to_json(v));
                        },
                    }
                }

                IndexHit {
                    identity_key,
                    score: point.score,
                    text,
                    metadata,
                }
            })
            .collect();

        Ok(hits)
    }
}
