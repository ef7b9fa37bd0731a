//! Match pipeline
//!
//! End-to-end query flow: validate, retrieve the candidate pool,
//! deduplicate, rerank under a time budget, calibrate confidence and
//! route to a decision. Reranker failure or timeout degrades the query
//! to hybrid-only confidence instead of failing it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ordermatch_config::constants::{retrieval, timeouts};
use ordermatch_config::MatchingConfig;
use ordermatch_core::{AvailabilityCheck, Error, MatchResult, QueryRequest, Reranker, Result};

use crate::calibrator::ConfidenceCalibrator;
use crate::retriever::HybridRetriever;
use crate::router::DecisionRouter;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Default number of final results per query
    pub final_top_k: usize,
    /// Candidate pool multiplier when a request has no explicit pool size
    pub candidate_multiplier: usize,
    /// Budget for one rerank pass before degrading to hybrid-only
    pub rerank_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            final_top_k: retrieval::DEFAULT_TOP_K,
            candidate_multiplier: retrieval::CANDIDATE_MULTIPLIER,
            rerank_timeout: Duration::from_millis(timeouts::RERANK_TIMEOUT_MS),
        }
    }
}

impl From<&MatchingConfig> for PipelineConfig {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            final_top_k: config.final_top_k,
            candidate_multiplier: config.candidate_multiplier,
            rerank_timeout: Duration::from_millis(config.rerank_timeout_ms),
        }
    }
}

/// Order match pipeline
pub struct MatchPipeline {
    retriever: HybridRetriever,
    reranker: Option<Arc<dyn Reranker>>,
    availability: Option<Arc<dyn AvailabilityCheck>>,
    calibrator: ConfidenceCalibrator,
    router: DecisionRouter,
    config: PipelineConfig,
}

impl MatchPipeline {
    pub fn new(
        retriever: HybridRetriever,
        calibrator: ConfidenceCalibrator,
        router: DecisionRouter,
        config: PipelineConfig,
    ) -> Self {
        Self {
            retriever,
            reranker: None,
            availability: None,
            calibrator,
            router,
            config,
        }
    }

    /// Attach a reranker backend
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Attach a stock availability check
    pub fn with_availability_check(mut self, check: Arc<dyn AvailabilityCheck>) -> Self {
        self.availability = Some(check);
        self
    }

    /// Match a free-text order request against the catalog
    pub async fn match_query(&self, request: &QueryRequest) -> Result<MatchResult> {
        let started = Instant::now();
        request.validate()?;

        let n_results = request.n_results.unwrap_or(self.config.final_top_k);
        if let Some(n_candidates) = request.n_candidates {
            if n_candidates < n_results {
                return Err(Error::InvalidInput(format!(
                    "n_candidates ({}) must be >= n_results ({})",
                    n_candidates, n_results
                )));
            }
        }
        let n_candidates = request
            .n_candidates
            .unwrap_or(n_results * self.config.candidate_multiplier);

        let filters = if request.filters.is_empty() {
            None
        } else {
            Some(&request.filters)
        };

        let candidates = self
            .retriever
            .search(&request.text, n_candidates, filters)
            .await?;

        if candidates.is_empty() {
            let (decision, decision_reason) =
                self.router
                    .route(&[], self.availability.as_deref(), request.requested_quantity);
            return Ok(MatchResult {
                candidates: Vec::new(),
                decision,
                decision_reason,
            });
        }

        // Dedup before reranking so duplicates never consume rerank budget
        let deduped = self.calibrator.dedup(candidates);

        let rerank_scores = match &self.reranker {
            Some(reranker) => {
                self.rerank(reranker.as_ref(), &request.text, &deduped, started, request)
                    .await
            },
            None => None,
        };

        let results = self
            .calibrator
            .calibrate(deduped, rerank_scores.as_ref(), n_results);

        let (decision, decision_reason) = self.router.route(
            &results,
            self.availability.as_deref(),
            request.requested_quantity,
        );

        Ok(MatchResult {
            candidates: results,
            decision,
            decision_reason,
        })
    }

    /// Run the reranker under the remaining time budget
    ///
    /// Any failure (backend error, timeout, score count mismatch) logs a
    /// warning and returns None, which downstream means hybrid-only
    /// confidence.
    async fn rerank(
        &self,
        reranker: &dyn Reranker,
        query: &str,
        candidates: &[ordermatch_core::Candidate],
        started: Instant,
        request: &QueryRequest,
    ) -> Option<HashMap<String, f32>> {
        let mut budget = self.config.rerank_timeout;
        if let Some(deadline_ms) = request.deadline_ms {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let remaining = deadline_ms.saturating_sub(elapsed_ms);
            if remaining == 0 {
                tracing::warn!(
                    reranker = reranker.name(),
                    "Query deadline exhausted before reranking, using hybrid scores"
                );
                return None;
            }
            budget = budget.min(Duration::from_millis(remaining));
        }

        let pairs: Vec<(String, String)> = candidates
            .iter()
            .map(|c| (c.identity_key.clone(), c.text.clone()))
            .collect();

        match tokio::time::timeout(budget, reranker.score(query, &pairs)).await {
            Ok(Ok(scores)) => {
                if scores.len() != pairs.len() {
                    tracing::warn!(
                        reranker = reranker.name(),
                        sent = pairs.len(),
                        received = scores.len(),
                        "Rerank score count mismatch, using hybrid scores"
                    );
                    return None;
                }
                Some(
                    pairs
                        .into_iter()
                        .map(|(key, _)| key)
                        .zip(scores)
                        .collect(),
                )
            },
            Ok(Err(e)) => {
                tracing::warn!(
                    reranker = reranker.name(),
                    error = %e,
                    "Reranker failed, using hybrid scores"
                );
                None
            },
            Err(_) => {
                tracing::warn!(
                    reranker = reranker.name(),
                    budget_ms = budget.as_millis() as u64,
                    "Rerank timed out, using hybrid scores"
                );
                None
            },
        }
    }
}
