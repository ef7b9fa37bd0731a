//! End-to-end pipeline tests over an in-process catalog

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ordermatch_core::{
    AvailabilityCheck, CatalogItem, Decision, EmbeddingIndex, Error, IndexHit, QueryRequest,
    Reranker, Result,
};
use ordermatch_engine::{
    ConfidenceCalibrator, DecisionRouter, Embedder, FusionConfig, HashEmbedder, HybridRetriever,
    KeywordConfig, KeywordIndex, LexicalReranker, MatchPipeline, MemoryEmbeddingIndex,
    PipelineConfig,
};

fn catalog(embedder: &HashEmbedder) -> Vec<CatalogItem> {
    [
        ("T-100", "Black Cotton Woven Tag", 5000u32),
        ("T-101", "Black Satin Woven Tag", 1200),
        ("L-200", "White Polyester Printed Label", 800),
        ("P-300", "Blue Denim Embroidered Patch", 0),
    ]
    .into_iter()
    .map(|(key, text, stock)| {
        CatalogItem::new(key, text, embedder.embed(text).unwrap())
            .with_metadata("stock", stock)
    })
    .collect()
}

struct StockCheck {
    stock: HashMap<String, u32>,
}

impl AvailabilityCheck for StockCheck {
    fn is_available(&self, identity_key: &str, requested_quantity: u32) -> bool {
        self.stock
            .get(identity_key)
            .map_or(false, |available| *available >= requested_quantity)
    }
}

async fn build_pipeline(reranker: Option<Arc<dyn Reranker>>) -> MatchPipeline {
    let embedder = HashEmbedder::with_dim(384);
    let items = catalog(&embedder);

    let index = MemoryEmbeddingIndex::new();
    index.add(&items).await.unwrap();

    let keyword = KeywordIndex::new(KeywordConfig::default()).unwrap();
    keyword.index_items(&items).unwrap();

    let retriever = HybridRetriever::new(
        FusionConfig::default(),
        Arc::new(embedder),
        Arc::new(index),
    )
    .with_keyword_index(Arc::new(keyword));

    let stock = StockCheck {
        stock: items
            .iter()
            .map(|item| {
                let qty = item
                    .metadata
                    .get("stock")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32;
                (item.identity_key.clone(), qty)
            })
            .collect(),
    };

    let mut pipeline = MatchPipeline::new(
        retriever,
        ConfidenceCalibrator::default(),
        DecisionRouter::default(),
        PipelineConfig::default(),
    )
    .with_availability_check(Arc::new(stock));

    if let Some(reranker) = reranker {
        pipeline = pipeline.with_reranker(reranker);
    }
    pipeline
}

#[tokio::test]
async fn clean_match_auto_approves() {
    let pipeline = build_pipeline(Some(Arc::new(LexicalReranker::new()))).await;

    let request = QueryRequest::new("black cotton tag").with_results(5).with_quantity(500);
    let result = pipeline.match_query(&request).await.unwrap();

    assert_eq!(result.decision, Decision::AutoApprove);
    let top = &result.candidates[0];
    assert_eq!(top.identity_key, "T-100");
    assert!(top.final_confidence >= 0.90);
    assert!(top.rerank_score.is_some());
}

#[tokio::test]
async fn unmatchable_request_asks_for_clarification() {
    let pipeline = build_pipeline(Some(Arc::new(LexicalReranker::new()))).await;

    let request = QueryRequest::new("holographic chip sticker").with_results(5);
    let result = pipeline.match_query(&request).await.unwrap();

    assert_eq!(result.decision, Decision::ClarificationNeeded);
    assert!(result.candidates.is_empty());
    assert!(!result.decision_reason.is_empty());
}

#[tokio::test]
async fn ambiguous_match_goes_to_review() {
    let pipeline = build_pipeline(Some(Arc::new(LexicalReranker::new()))).await;

    // "velvet" matches nothing, the rest matches two items equally well
    let request = QueryRequest::new("black velvet tag").with_results(5).with_quantity(10);
    let result = pipeline.match_query(&request).await.unwrap();

    assert_eq!(result.decision, Decision::HumanReview);
    let top = &result.candidates[0];
    assert!(top.final_confidence < 0.90);
    assert!(top.final_confidence >= 0.60);
}

#[tokio::test]
async fn out_of_stock_downgrades_to_review() {
    let pipeline = build_pipeline(Some(Arc::new(LexicalReranker::new()))).await;

    // Confident match, but the order asks for more than the stock holds
    let request = QueryRequest::new("black cotton tag").with_results(5).with_quantity(100_000);
    let result = pipeline.match_query(&request).await.unwrap();

    assert_eq!(result.decision, Decision::HumanReview);
    assert!(result.decision_reason.contains("stock"));
    assert!(result.candidates[0].final_confidence >= 0.90);
}

#[tokio::test]
async fn result_invariants_hold() {
    let pipeline = build_pipeline(Some(Arc::new(LexicalReranker::new()))).await;

    let request = QueryRequest::new("black woven tag").with_results(3);
    let result = pipeline.match_query(&request).await.unwrap();

    assert!(result.candidates.len() <= 3);

    let mut seen = std::collections::HashSet::new();
    for candidate in &result.candidates {
        assert!(seen.insert(candidate.identity_key.clone()));
        assert!((0.0..=1.0).contains(&candidate.final_confidence));
        assert!((0.0..=1.0).contains(&candidate.hybrid_score));
    }
    for pair in result.candidates.windows(2) {
        assert!(pair[0].final_confidence >= pair[1].final_confidence);
    }
}

struct FailingReranker;

#[async_trait]
impl Reranker for FailingReranker {
    async fn score(&self, _query: &str, _pairs: &[(String, String)]) -> Result<Vec<f32>> {
        Err(Error::RerankerUnavailable("model offline".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

struct SlowReranker;

#[async_trait]
impl Reranker for SlowReranker {
    async fn score(&self, _query: &str, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![1.0; pairs.len()])
    }

    fn name(&self) -> &str {
        "slow"
    }
}

struct MismatchReranker;

#[async_trait]
impl Reranker for MismatchReranker {
    async fn score(&self, _query: &str, _pairs: &[(String, String)]) -> Result<Vec<f32>> {
        Ok(vec![0.5])
    }

    fn name(&self) -> &str {
        "mismatch"
    }
}

#[tokio::test]
async fn reranker_failure_degrades_to_hybrid_scores() {
    let degraded = build_pipeline(Some(Arc::new(FailingReranker))).await;
    let baseline = build_pipeline(None).await;

    let request = QueryRequest::new("black cotton tag").with_results(5);
    let degraded_result = degraded.match_query(&request).await.unwrap();
    let baseline_result = baseline.match_query(&request).await.unwrap();

    // Degraded run must equal the hybrid-only run
    assert_eq!(
        degraded_result.candidates.len(),
        baseline_result.candidates.len()
    );
    for (d, b) in degraded_result
        .candidates
        .iter()
        .zip(&baseline_result.candidates)
    {
        assert_eq!(d.identity_key, b.identity_key);
        assert_eq!(d.rerank_score, None);
        assert!((d.final_confidence - b.hybrid_score).abs() < 1e-6);
    }
    assert_eq!(degraded_result.decision, baseline_result.decision);
}

#[tokio::test]
async fn slow_reranker_times_out_and_degrades() {
    let pipeline = build_pipeline(Some(Arc::new(SlowReranker))).await;

    let request = QueryRequest::new("black cotton tag").with_results(5).with_deadline_ms(100);
    let started = std::time::Instant::now();
    let result = pipeline.match_query(&request).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(result.candidates.iter().all(|c| c.rerank_score.is_none()));
}

#[tokio::test]
async fn exhausted_deadline_skips_reranking() {
    let pipeline = build_pipeline(Some(Arc::new(SlowReranker))).await;

    let request = QueryRequest::new("black cotton tag").with_results(5).with_deadline_ms(0);
    let result = pipeline.match_query(&request).await.unwrap();

    assert!(!result.candidates.is_empty());
    assert!(result.candidates.iter().all(|c| c.rerank_score.is_none()));
}

#[tokio::test]
async fn score_count_mismatch_degrades() {
    let pipeline = build_pipeline(Some(Arc::new(MismatchReranker))).await;

    let request = QueryRequest::new("black woven tag").with_results(5);
    let result = pipeline.match_query(&request).await.unwrap();

    assert!(result.candidates.len() > 1);
    assert!(result.candidates.iter().all(|c| c.rerank_score.is_none()));
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let pipeline = build_pipeline(None).await;

    for request in [
        QueryRequest::new(""),
        QueryRequest::new("   "),
        QueryRequest::new("black tag").with_results(0),
        QueryRequest::new("black tag").with_results(5).with_candidate_pool(2),
        // Pool check also holds against the configured default result count
        QueryRequest::new("black tag").with_candidate_pool(2),
    ] {
        let result = pipeline.match_query(&request).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}

#[tokio::test]
async fn semantic_only_pipeline_still_matches() {
    let embedder = HashEmbedder::with_dim(384);
    let items = catalog(&embedder);

    let index = MemoryEmbeddingIndex::new();
    index.add(&items).await.unwrap();

    let retriever = HybridRetriever::new(
        FusionConfig::default(),
        Arc::new(embedder),
        Arc::new(index),
    );

    let pipeline = MatchPipeline::new(
        retriever,
        ConfidenceCalibrator::default(),
        DecisionRouter::default(),
        PipelineConfig::default(),
    )
    .with_reranker(Arc::new(LexicalReranker::new()));

    let request = QueryRequest::new("black cotton tag").with_results(5);
    let result = pipeline.match_query(&request).await.unwrap();

    assert!(!result.candidates.is_empty());
    assert_eq!(result.candidates[0].identity_key, "T-100");
    // Keyword side absent entirely, scores still well-formed
    assert!(result.candidates.iter().all(|c| c.keyword_score == 0.0));
}

#[tokio::test]
async fn high_confidence_without_availability_check_goes_to_review() {
    let embedder = HashEmbedder::with_dim(384);
    let items = catalog(&embedder);

    let index = MemoryEmbeddingIndex::new();
    index.add(&items).await.unwrap();
    let keyword = KeywordIndex::new(KeywordConfig::default()).unwrap();
    keyword.index_items(&items).unwrap();

    let retriever = HybridRetriever::new(
        FusionConfig::default(),
        Arc::new(embedder),
        Arc::new(index),
    )
    .with_keyword_index(Arc::new(keyword));

    let pipeline = MatchPipeline::new(
        retriever,
        ConfidenceCalibrator::default(),
        DecisionRouter::default(),
        PipelineConfig::default(),
    )
    .with_reranker(Arc::new(LexicalReranker::new()));

    let request = QueryRequest::new("black cotton tag").with_results(5);
    let result = pipeline.match_query(&request).await.unwrap();

    assert_eq!(result.decision, Decision::HumanReview);
    assert!(result.decision_reason.contains("unknown"));
}

#[tokio::test]
async fn metadata_filters_narrow_the_pool() {
    let embedder = HashEmbedder::with_dim(384);
    let items: Vec<CatalogItem> = [
        ("T-100", "Black Cotton Woven Tag", "cotton"),
        ("T-101", "Black Satin Woven Tag", "satin"),
    ]
    .into_iter()
    .map(|(key, text, material)| {
        CatalogItem::new(key, text, embedder.embed(text).unwrap())
            .with_metadata("material", material)
    })
    .collect();

    let index = MemoryEmbeddingIndex::new();
    index.add(&items).await.unwrap();
    let keyword = KeywordIndex::new(KeywordConfig::default()).unwrap();
    keyword.index_items(&items).unwrap();

    let retriever = HybridRetriever::new(
        FusionConfig::default(),
        Arc::new(embedder),
        Arc::new(index),
    )
    .with_keyword_index(Arc::new(keyword));

    let pipeline = MatchPipeline::new(
        retriever,
        ConfidenceCalibrator::default(),
        DecisionRouter::default(),
        PipelineConfig::default(),
    )
    .with_reranker(Arc::new(LexicalReranker::new()));

    let request = QueryRequest::new("black woven tag").with_results(5).with_filter("material", "satin");
    let result = pipeline.match_query(&request).await.unwrap();

    assert!(result
        .candidates
        .iter()
        .all(|c| c.identity_key == "T-101"));
}

#[tokio::test]
async fn duplicate_index_hits_are_deduplicated() {
    struct DupIndex;

    #[async_trait]
    impl EmbeddingIndex for DupIndex {
        async fn add(&self, _items: &[CatalogItem]) -> Result<()> {
            Ok(())
        }

        async fn query(
            &self,
            _vector: &[f32],
            _k: usize,
            _filters: Option<&HashMap<String, serde_json::Value>>,
        ) -> Result<Vec<IndexHit>> {
            let hit = |key: &str, score: f32| IndexHit {
                identity_key: key.to_string(),
                score,
                text: "Black Cotton Woven Tag".to_string(),
                metadata: HashMap::new(),
            };
            Ok(vec![hit("T-100", 0.9), hit("L-200", 0.7), hit("T-100", 0.5)])
        }
    }

    let pipeline = MatchPipeline::new(
        HybridRetriever::new(
            FusionConfig::default(),
            Arc::new(HashEmbedder::with_dim(16)),
            Arc::new(DupIndex),
        ),
        ConfidenceCalibrator::default(),
        DecisionRouter::default(),
        PipelineConfig::default(),
    );

    let request = QueryRequest::new("black cotton tag").with_results(5);
    let result = pipeline.match_query(&request).await.unwrap();

    let keys: Vec<&str> = result
        .candidates
        .iter()
        .map(|c| c.identity_key.as_str())
        .collect();
    assert_eq!(keys.iter().filter(|k| **k == "T-100").count(), 1);
    assert_eq!(result.candidates.len(), 2);
}

#[tokio::test]
async fn unsized_request_uses_configured_result_count() {
    let embedder = HashEmbedder::with_dim(384);
    let items = catalog(&embedder);

    let index = MemoryEmbeddingIndex::new();
    index.add(&items).await.unwrap();
    let keyword = KeywordIndex::new(KeywordConfig::default()).unwrap();
    keyword.index_items(&items).unwrap();

    let retriever = HybridRetriever::new(
        FusionConfig::default(),
        Arc::new(embedder),
        Arc::new(index),
    )
    .with_keyword_index(Arc::new(keyword));

    let config = PipelineConfig {
        final_top_k: 1,
        ..PipelineConfig::default()
    };
    let pipeline = MatchPipeline::new(
        retriever,
        ConfidenceCalibrator::default(),
        DecisionRouter::default(),
        config,
    )
    .with_reranker(Arc::new(LexicalReranker::new()));

    // Two woven tags match, the configured result count keeps only one
    let request = QueryRequest::new("black woven tag");
    let result = pipeline.match_query(&request).await.unwrap();
    assert_eq!(result.candidates.len(), 1);

    // An explicit request size overrides the configured one
    let request = QueryRequest::new("black woven tag").with_results(2);
    let result = pipeline.match_query(&request).await.unwrap();
    assert_eq!(result.candidates.len(), 2);
}

#[tokio::test]
async fn unreachable_embedding_index_fails_the_query() {
    struct OfflineIndex;

    #[async_trait]
    impl EmbeddingIndex for OfflineIndex {
        async fn add(&self, _items: &[CatalogItem]) -> Result<()> {
            Err(Error::IndexUnavailable("connection refused".to_string()))
        }

        async fn query(
            &self,
            _vector: &[f32],
            _k: usize,
            _filters: Option<&HashMap<String, serde_json::Value>>,
        ) -> Result<Vec<IndexHit>> {
            Err(Error::IndexUnavailable("connection refused".to_string()))
        }
    }

    let pipeline = MatchPipeline::new(
        HybridRetriever::new(
            FusionConfig::default(),
            Arc::new(HashEmbedder::with_dim(16)),
            Arc::new(OfflineIndex),
        ),
        ConfidenceCalibrator::default(),
        DecisionRouter::default(),
        PipelineConfig::default(),
    )
    .with_reranker(Arc::new(LexicalReranker::new()));

    // Dense-path failure is never degraded away, and the caller sees the
    // index taxonomy variant rather than a generic search error
    let request = QueryRequest::new("black cotton tag").with_results(5);
    let result = pipeline.match_query(&request).await;
    assert!(matches!(result, Err(Error::IndexUnavailable(_))));
}
