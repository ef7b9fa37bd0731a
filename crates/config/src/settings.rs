//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{embedding, endpoints, fusion, retrieval, routing, timeouts};
use crate::ConfigError;

/// Runtime environment enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Score weights, thresholds and pool sizing
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Vector store connection settings
    #[serde(default)]
    pub vector_store: VectorStoreSettings,

    /// Keyword index settings
    #[serde(default)]
    pub keyword_index: KeywordIndexSettings,

    /// Reranker backend settings
    #[serde(default)]
    pub reranker: RerankerSettings,
}

/// Score weights, decision thresholds and retrieval sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Weight of the semantic signal in hybrid fusion (0.0 - 1.0)
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    /// Weight of the keyword signal in hybrid fusion (0.0 - 1.0)
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Weight of the hybrid score in the final confidence blend
    #[serde(default = "default_hybrid_weight")]
    pub hybrid_weight: f32,

    /// Weight of the rerank score in the final confidence blend
    #[serde(default = "default_rerank_weight")]
    pub rerank_weight: f32,

    /// Minimum confidence for auto-approval (inclusive)
    #[serde(default = "default_auto_approve_threshold")]
    pub auto_approve_threshold: f32,

    /// Minimum confidence for human review (inclusive)
    #[serde(default = "default_human_review_threshold")]
    pub human_review_threshold: f32,

    /// Candidate pool multiplier when a request has no explicit pool size
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// Default number of final results per query
    #[serde(default = "default_final_top_k")]
    pub final_top_k: usize,

    /// Minimum raw similarity for embedding index hits
    #[serde(default = "default_min_semantic_score")]
    pub min_semantic_score: f32,

    /// Rerank budget before degrading to hybrid-only scores (ms)
    #[serde(default = "default_rerank_timeout_ms")]
    pub rerank_timeout_ms: u64,
}

fn default_semantic_weight() -> f32 {
    fusion::SEMANTIC_WEIGHT
}
fn default_keyword_weight() -> f32 {
    fusion::KEYWORD_WEIGHT
}
fn default_hybrid_weight() -> f32 {
    fusion::HYBRID_WEIGHT
}
fn default_rerank_weight() -> f32 {
    fusion::RERANK_WEIGHT
}
fn default_auto_approve_threshold() -> f32 {
    routing::AUTO_APPROVE_THRESHOLD
}
fn default_human_review_threshold() -> f32 {
    routing::HUMAN_REVIEW_THRESHOLD
}
fn default_candidate_multiplier() -> usize {
    retrieval::CANDIDATE_MULTIPLIER
}
fn default_final_top_k() -> usize {
    retrieval::DEFAULT_TOP_K
}
fn default_min_semantic_score() -> f32 {
    retrieval::MIN_SEMANTIC_SCORE
}
fn default_rerank_timeout_ms() -> u64 {
    timeouts::RERANK_TIMEOUT_MS
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            hybrid_weight: default_hybrid_weight(),
            rerank_weight: default_rerank_weight(),
            auto_approve_threshold: default_auto_approve_threshold(),
            human_review_threshold: default_human_review_threshold(),
            candidate_multiplier: default_candidate_multiplier(),
            final_top_k: default_final_top_k(),
            min_semantic_score: default_min_semantic_score(),
            rerank_timeout_ms: default_rerank_timeout_ms(),
        }
    }
}

/// Distance metric for the vector store collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    Dot,
}

/// Vector store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreSettings {
    /// Qdrant endpoint URL
    #[serde(default = "default_qdrant_endpoint")]
    pub endpoint: String,

    /// Collection name
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Embedding dimension
    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,

    /// Distance metric used when the collection is created
    #[serde(default)]
    pub distance: DistanceMetric,

    /// API key (optional, for cloud deployments)
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_collection() -> String {
    "catalog_items".to_string()
}
fn default_vector_dim() -> usize {
    embedding::DEFAULT_DIM
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            endpoint: default_qdrant_endpoint(),
            collection: default_collection(),
            vector_dim: default_vector_dim(),
            distance: DistanceMetric::default(),
            api_key: None,
        }
    }
}

/// Keyword index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordIndexSettings {
    /// Index path (RAM directory if None)
    #[serde(default)]
    pub index_path: Option<String>,

    /// Language for analysis
    #[serde(default = "default_language")]
    pub language: String,

    /// Enable stemming
    #[serde(default = "default_true")]
    pub stemming: bool,
}

fn default_language() -> String {
    "en".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for KeywordIndexSettings {
    fn default() -> Self {
        Self {
            index_path: None,
            language: default_language(),
            stemming: default_true(),
        }
    }
}

/// Reranker backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerSettings {
    /// Remote rerank service endpoint (None = no remote backend)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Local cross-encoder model path (.onnx)
    #[serde(default)]
    pub model_path: String,

    /// Tokenizer path (.json)
    #[serde(default)]
    pub tokenizer_path: String,

    /// Maximum sequence length
    #[serde(default = "default_max_seq_len")]
    pub max_seq_len: usize,
}

fn default_max_seq_len() -> usize {
    embedding::MAX_SEQ_LEN
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model_path: String::new(),
            tokenizer_path: String::new(),
            max_seq_len: default_max_seq_len(),
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_matching()?;
        self.validate_backends()?;
        Ok(())
    }

    fn validate_matching(&self) -> Result<(), ConfigError> {
        let matching = &self.matching;

        for (field, value) in [
            ("matching.semantic_weight", matching.semantic_weight),
            ("matching.keyword_weight", matching.keyword_weight),
            ("matching.hybrid_weight", matching.hybrid_weight),
            ("matching.rerank_weight", matching.rerank_weight),
            (
                "matching.auto_approve_threshold",
                matching.auto_approve_threshold,
            ),
            (
                "matching.human_review_threshold",
                matching.human_review_threshold,
            ),
            ("matching.min_semantic_score", matching.min_semantic_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0.0 and 1.0, got {}", value),
                });
            }
        }

        if (matching.semantic_weight + matching.keyword_weight - 1.0).abs() > 1e-3 {
            return Err(ConfigError::InvalidValue {
                field: "matching.semantic_weight".to_string(),
                message: format!(
                    "semantic_weight + keyword_weight must sum to 1.0, got {}",
                    matching.semantic_weight + matching.keyword_weight
                ),
            });
        }

        if (matching.hybrid_weight + matching.rerank_weight - 1.0).abs() > 1e-3 {
            return Err(ConfigError::InvalidValue {
                field: "matching.hybrid_weight".to_string(),
                message: format!(
                    "hybrid_weight + rerank_weight must sum to 1.0, got {}",
                    matching.hybrid_weight + matching.rerank_weight
                ),
            });
        }

        if matching.auto_approve_threshold <= matching.human_review_threshold {
            return Err(ConfigError::InvalidValue {
                field: "matching.auto_approve_threshold".to_string(),
                message: format!(
                    "Must be above human_review_threshold ({})",
                    matching.human_review_threshold
                ),
            });
        }

        if matching.final_top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "matching.final_top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if matching.candidate_multiplier == 0 {
            return Err(ConfigError::InvalidValue {
                field: "matching.candidate_multiplier".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if matching.rerank_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "matching.rerank_timeout_ms".to_string(),
                message: "Must be at least 1ms".to_string(),
            });
        }

        Ok(())
    }

    fn validate_backends(&self) -> Result<(), ConfigError> {
        if self.vector_store.vector_dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "vector_store.vector_dim".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.reranker.max_seq_len < 8 {
            return Err(ConfigError::InvalidValue {
                field: "reranker.max_seq_len".to_string(),
                message: format!("Too small to hold a query/text pair: {}", self.reranker.max_seq_len),
            });
        }

        // A model path without a tokenizer (or vice versa) is a likely
        // misconfiguration; hard error only in strict environments.
        let model_half_configured =
            self.reranker.model_path.is_empty() != self.reranker.tokenizer_path.is_empty();
        if model_half_configured {
            if self.environment.is_strict() {
                return Err(ConfigError::InvalidValue {
                    field: "reranker.model_path".to_string(),
                    message: "model_path and tokenizer_path must be set together".to_string(),
                });
            }
            tracing::warn!("Reranker model_path/tokenizer_path only partially configured");
        }

        Ok(())
    }
}

/// Load settings from files and environment
///
/// Layering: config/default < config/{env} < ORDER_MATCH__* variables.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("ORDER_MATCH")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
