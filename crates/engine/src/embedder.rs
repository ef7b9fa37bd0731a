//! Query text embeddings
//!
//! Catalog embeddings arrive pre-computed with each `CatalogItem`; this
//! module only embeds query text. The model-backed embedder is gated
//! behind the `onnx` feature; `HashEmbedder` is the deterministic
//! no-model fallback used in tests and development.

#[cfg(feature = "onnx")]
use ndarray::Array2;
#[cfg(feature = "onnx")]
use ort::{session::builder::GraphOptimizationLevel, session::Session, value::Tensor};
#[cfg(feature = "onnx")]
use std::path::Path;
#[cfg(feature = "onnx")]
use tokenizers::Tokenizer;

use ordermatch_core::Result;
#[cfg(feature = "onnx")]
use ordermatch_core::Error;

/// Embedder configuration
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    /// Embedding dimension
    pub embedding_dim: usize,
    /// Maximum sequence length
    pub max_seq_len: usize,
    /// Normalize embeddings to unit length
    pub normalize: bool,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        use ordermatch_config::constants::embedding;
        Self {
            embedding_dim: embedding::DEFAULT_DIM,
            max_seq_len: embedding::MAX_SEQ_LEN,
            normalize: true,
        }
    }
}

/// Text embedder for query strings
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get embedding dimension
    fn dim(&self) -> usize;
}

/// Deterministic token-hash embedder (no model required)
///
/// Each lowercase token is hashed into one dimension of a bag-of-words
/// vector, which is then L2-normalized. Texts sharing tokens get
/// proportional cosine similarity; disjoint texts score ~0. Uses
/// `DefaultHasher::new()` so output is stable across processes.
pub struct HashEmbedder {
    config: EmbedderConfig,
}

impl HashEmbedder {
    pub fn new(config: EmbedderConfig) -> Self {
        Self { config }
    }

    /// Embedder with the default dimension
    pub fn with_dim(embedding_dim: usize) -> Self {
        Self {
            config: EmbedderConfig {
                embedding_dim,
                ..EmbedderConfig::default()
            },
        }
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut embedding = vec![0.0f32; self.config.embedding_dim];

        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() % self.config.embedding_dim as u64) as usize;
            embedding[idx] += 1.0;
        }

        if self.config.normalize {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.config.embedding_dim
    }
}

/// Transformer embedder using an ONNX model with mean pooling
#[cfg(feature = "onnx")]
pub struct OnnxEmbedder {
    session: Session,
    tokenizer: Tokenizer,
    config: EmbedderConfig,
}

#[cfg(feature = "onnx")]
impl OnnxEmbedder {
    /// Create a new embedder from model and tokenizer files
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        config: EmbedderConfig,
    ) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| Error::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::Model(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e| Error::Model(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| Error::Model(e.to_string()))?;

        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| Error::Model(e.to_string()))?;

        Ok(Self {
            session,
            tokenizer,
            config,
        })
    }
}

#[cfg(feature = "onnx")]
impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let seq_len = encoding.get_ids().len().min(self.config.max_seq_len);

        let mut input_ids = vec![0i64; self.config.max_seq_len];
        let mut attention_mask = vec![0i64; self.config.max_seq_len];
        let mut token_type_ids = vec![0i64; self.config.max_seq_len];

        for j in 0..seq_len {
            input_ids[j] = encoding.get_ids()[j] as i64;
            attention_mask[j] = encoding.get_attention_mask()[j] as i64;
            token_type_ids[j] = encoding.get_type_ids()[j] as i64;
        }

        let input_ids = Array2::from_shape_vec((1, self.config.max_seq_len), input_ids)
            .map_err(|e| Error::Embedding(e.to_string()))?;
        let attention_mask = Array2::from_shape_vec((1, self.config.max_seq_len), attention_mask)
            .map_err(|e| Error::Embedding(e.to_string()))?;
        let token_type_ids = Array2::from_shape_vec((1, self.config.max_seq_len), token_type_ids)
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let input_ids_tensor =
            Tensor::from_array(input_ids).map_err(|e| Error::Model(e.to_string()))?;
        let attention_mask_tensor =
            Tensor::from_array(attention_mask).map_err(|e| Error::Model(e.to_string()))?;
        let token_type_ids_tensor =
            Tensor::from_array(token_type_ids).map_err(|e| Error::Model(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| Error::Model(e.to_string()))?;

        let (shape, hidden_data) = outputs
            .get("last_hidden_state")
            .ok_or_else(|| Error::Model("Missing output tensor: last_hidden_state".to_string()))?
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Model(e.to_string()))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        if dims.len() != 3 {
            return Err(Error::Model(format!("Unexpected tensor shape: {:?}", dims)));
        }
        let (tensor_seq_len, tensor_hidden_dim) = (dims[1], dims[2]);

        // Mean pooling over the attended tokens
        let pooled_len = seq_len.min(tensor_seq_len).max(1);
        let mut embedding = vec![0.0f32; self.config.embedding_dim];
        for j in 0..pooled_len {
            for k in 0..self.config.embedding_dim.min(tensor_hidden_dim) {
                let idx = j * tensor_hidden_dim + k;
                if idx < hidden_data.len() {
                    embedding[k] += hidden_data[idx];
                }
            }
        }
        for v in &mut embedding {
            *v /= pooled_len as f32;
        }

        if self.config.normalize {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.config.embedding_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_normalized() {
        let embedder = HashEmbedder::new(EmbedderConfig::default());
        let embedding = embedder.embed("black cotton woven tag").unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::with_dim(128);
        let a = embedder.embed("Black Cotton Tag").unwrap();
        let b = embedder.embed("black cotton tag").unwrap();
        // Case-insensitive and stable
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_tokens_have_similarity() {
        let embedder = HashEmbedder::with_dim(384);
        let query = embedder.embed("black cotton tag").unwrap();
        let related = embedder.embed("black cotton woven tag").unwrap();
        let unrelated = embedder.embed("white polyester printed label").unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&query, &related) > 0.8);
        assert!(dot(&query, &unrelated) < 0.3);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::with_dim(64);
        let embedding = embedder.embed("   ").unwrap();
        assert!(embedding.iter().all(|v| *v == 0.0));
    }
}
