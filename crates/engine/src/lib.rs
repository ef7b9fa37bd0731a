//! Order match engine with hybrid search
//!
//! Features:
//! - Dense vector search via Qdrant or an in-process index
//! - Sparse BM25 search via Tantivy
//! - Hybrid fusion with min-max normalized weighted scores
//! - Cross-encoder reranking (local ONNX, remote service, or lexical
//!   fallback)
//! - Confidence calibration with identity-key deduplication
//! - Threshold-driven decision routing (auto-approve / human review /
//!   clarification)
//! - Deadline-aware pipeline with graceful rerank degradation

pub mod calibrator;
pub mod embedder;
pub mod keyword_index;
pub mod pipeline;
pub mod reranker;
pub mod retriever;
pub mod router;
pub mod vector_index;

pub use calibrator::ConfidenceCalibrator;
pub use embedder::{Embedder, EmbedderConfig, HashEmbedder};
#[cfg(feature = "onnx")]
pub use embedder::OnnxEmbedder;
pub use keyword_index::{KeywordConfig, KeywordHit, KeywordIndex};
pub use pipeline::{MatchPipeline, PipelineConfig};
pub use reranker::{LexicalReranker, RemoteReranker, RemoteRerankerConfig, RerankerStats};
#[cfg(feature = "onnx")]
pub use reranker::{CrossEncoderConfig, CrossEncoderReranker};
pub use retriever::{FusionConfig, HybridRetriever};
pub use router::DecisionRouter;
pub use vector_index::{MemoryEmbeddingIndex, QdrantEmbeddingIndex, VectorDistance, VectorStoreConfig};

pub use ordermatch_core::{Error, Result};
