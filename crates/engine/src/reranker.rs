//! Reranker backends
//!
//! Second-stage scoring of retrieved candidates against the query.
//! Three implementations of the core `Reranker` trait:
//! - `LexicalReranker`: IDF-weighted term coverage, no model required
//! - `RemoteReranker`: HTTP cross-encoder service
//! - `CrossEncoderReranker`: local ONNX cross-encoder (feature `onnx`)
//!
//! Scoring failures map to `Error::RerankerUnavailable` so the pipeline
//! can fall back to hybrid-only confidence instead of failing the query.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

#[cfg(feature = "onnx")]
use ndarray::Array2;
#[cfg(feature = "onnx")]
use ort::{session::builder::GraphOptimizationLevel, session::Session, value::Tensor};
#[cfg(feature = "onnx")]
use std::path::Path;
#[cfg(feature = "onnx")]
use tokenizers::Tokenizer;

use ordermatch_config::constants::{endpoints, timeouts};
use ordermatch_core::{Error, Reranker, Result};

/// Reranker statistics
#[derive(Debug, Clone, Default)]
pub struct RerankerStats {
    /// Total rerank calls
    pub total_calls: usize,
    /// Total query/text pairs scored
    pub total_pairs: usize,
}

/// IDF-weighted term coverage scorer
///
/// Scores a pair by the fraction of query terms found in the candidate
/// text, weighted by `ln(1 + term_len)` so specific terms count more
/// than short generic ones. A candidate covering every query term
/// scores 1.0; one covering none scores 0.0.
pub struct LexicalReranker {
    stats: Mutex<RerankerStats>,
}

impl LexicalReranker {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(RerankerStats::default()),
        }
    }

    fn terms(text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1)
            .map(|t| t.to_string())
            .collect()
    }

    fn idf(term: &str) -> f32 {
        (1.0 + term.len() as f32).ln()
    }

    fn score_pair(query: &str, text: &str) -> f32 {
        let query_terms = Self::terms(query);
        if query_terms.is_empty() {
            return 0.0;
        }

        let doc_terms = Self::terms(text);

        let total_weight: f32 = query_terms.iter().map(|t| Self::idf(t)).sum();
        let matched_weight: f32 = query_terms
            .iter()
            .filter(|t| doc_terms.contains(*t))
            .map(|t| Self::idf(t))
            .sum();

        matched_weight / total_weight
    }

    /// Get scorer statistics
    pub fn stats(&self) -> RerankerStats {
        self.stats.lock().clone()
    }
}

impl Default for LexicalReranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn score(&self, query: &str, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        let scores = pairs
            .iter()
            .map(|(_, text)| Self::score_pair(query, text))
            .collect();

        let mut stats = self.stats.lock();
        stats.total_calls += 1;
        stats.total_pairs += pairs.len();

        Ok(scores)
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

/// Remote rerank service configuration
#[derive(Debug, Clone)]
pub struct RemoteRerankerConfig {
    /// Service endpoint (POST /rerank)
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RemoteRerankerConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::RERANKER_DEFAULT.to_string(),
            timeout: Duration::from_millis(timeouts::RERANK_TIMEOUT_MS),
        }
    }
}

#[derive(Serialize)]
struct RemoteRerankRequest<'a> {
    query: &'a str,
    documents: Vec<&'a str>,
}

#[derive(Deserialize)]
struct RemoteRerankResponse {
    scores: Vec<f32>,
}

/// Cross-encoder served over HTTP
pub struct RemoteReranker {
    client: reqwest::Client,
    config: RemoteRerankerConfig,
    stats: Mutex<RerankerStats>,
}

impl RemoteReranker {
    pub fn new(config: RemoteRerankerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::RerankerUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            config,
            stats: Mutex::new(RerankerStats::default()),
        })
    }

    pub fn stats(&self) -> RerankerStats {
        self.stats.lock().clone()
    }
}

#[async_trait]
impl Reranker for RemoteReranker {
    async fn score(&self, query: &str, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        let request = RemoteRerankRequest {
            query,
            documents: pairs.iter().map(|(_, text)| text.as_str()).collect(),
        };

        let url = format!("{}/rerank", self.config.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::RerankerUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::RerankerUnavailable(format!(
                "Rerank service returned {}",
                response.status()
            )));
        }

        let body: RemoteRerankResponse = response
            .json()
            .await
            .map_err(|e| Error::RerankerUnavailable(e.to_string()))?;

        if body.scores.len() != pairs.len() {
            return Err(Error::RerankerUnavailable(format!(
                "Score count mismatch: sent {} pairs, got {} scores",
                pairs.len(),
                body.scores.len()
            )));
        }

        let mut stats = self.stats.lock();
        stats.total_calls += 1;
        stats.total_pairs += pairs.len();

        Ok(body.scores)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Local cross-encoder configuration
#[cfg(feature = "onnx")]
#[derive(Debug, Clone)]
pub struct CrossEncoderConfig {
    /// Maximum sequence length for the encoded pair
    pub max_seq_len: usize,
}

#[cfg(feature = "onnx")]
impl Default for CrossEncoderConfig {
    fn default() -> Self {
        use ordermatch_config::constants::embedding;
        Self {
            max_seq_len: embedding::MAX_SEQ_LEN,
        }
    }
}

/// Local ONNX cross-encoder
///
/// Scores each pair independently; batching here must not change which
/// pairs are scored or what each pair scores.
#[cfg(feature = "onnx")]
pub struct CrossEncoderReranker {
    session: Session,
    tokenizer: Tokenizer,
    config: CrossEncoderConfig,
    stats: Mutex<RerankerStats>,
}

#[cfg(feature = "onnx")]
impl CrossEncoderReranker {
    /// Create a new cross-encoder from model and tokenizer files
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        config: CrossEncoderConfig,
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
            stats: Mutex::new(RerankerStats::default()),
        })
    }

    pub fn stats(&self) -> RerankerStats {
        self.stats.lock().clone()
    }

    fn score_pair(&self, query: &str, text: &str) -> Result<f32> {
        let encoding = self
            .tokenizer
            .encode((query, text), true)
            .map_err(|e| Error::RerankerUnavailable(e.to_string()))?;

        let ids: Vec<i64> = encoding
            .get_ids()
            .iter()
            .take(self.config.max_seq_len)
            .map(|&id| id as i64)
            .collect();

        let mut padded_ids = vec![0i64; self.config.max_seq_len];
        let mut padded_mask = vec![0i64; self.config.max_seq_len];
        padded_ids[..ids.len()].copy_from_slice(&ids);
        for slot in padded_mask.iter_mut().take(ids.len()) {
            *slot = 1;
        }

        let input_ids = Array2::from_shape_vec((1, self.config.max_seq_len), padded_ids)
            .map_err(|e| Error::RerankerUnavailable(e.to_string()))?;
        let attention = Array2::from_shape_vec((1, self.config.max_seq_len), padded_mask)
            .map_err(|e| Error::RerankerUnavailable(e.to_string()))?;

        let input_ids_tensor =
            Tensor::from_array(input_ids).map_err(|e| Error::RerankerUnavailable(e.to_string()))?;
        let attention_tensor =
            Tensor::from_array(attention).map_err(|e| Error::RerankerUnavailable(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_tensor,
            ])
            .map_err(|e| Error::RerankerUnavailable(e.to_string()))?;

        let (_, logits) = outputs
            .get("logits")
            .ok_or_else(|| Error::RerankerUnavailable("Missing logits output".to_string()))?
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::RerankerUnavailable(e.to_string()))?;

        Ok(Self::relevance_from_logits(logits))
    }

    fn relevance_from_logits(logits: &[f32]) -> f32 {
        if logits.len() >= 2 {
            // Softmax over [irrelevant, relevant]
            let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let exp_sum: f32 = logits.iter().map(|&x| (x - max).exp()).sum();
            (logits[1] - max).exp() / exp_sum
        } else if logits.len() == 1 {
            1.0 / (1.0 + (-logits[0]).exp())
        } else {
            0.0
        }
    }
}

#[cfg(feature = "onnx")]
#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn score(&self, query: &str, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(pairs.len());
        for (_, text) in pairs {
            scores.push(self.score_pair(query, text)?);
        }

        let mut stats = self.stats.lock();
        stats.total_calls += 1;
        stats.total_pairs += pairs.len();

        Ok(scores)
    }

    fn name(&self) -> &str {
        "cross-encoder"
    }
}
