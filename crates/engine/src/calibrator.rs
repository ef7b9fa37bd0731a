//! Confidence calibration
//!
//! Turns the retrieval pool into a final ranked result list:
//! deduplicates by identity key, blends hybrid and rerank scores into
//! one confidence, and truncates to the requested result count.

use std::collections::{HashMap, HashSet};

use ordermatch_config::constants::fusion;
use ordermatch_config::MatchingConfig;
use ordermatch_core::Candidate;

/// Confidence calibrator
#[derive(Debug, Clone)]
pub struct ConfidenceCalibrator {
    /// Weight of the hybrid score in the final blend
    pub hybrid_weight: f32,
    /// Weight of the rerank score in the final blend
    pub rerank_weight: f32,
}

impl Default for ConfidenceCalibrator {
    fn default() -> Self {
        Self {
            hybrid_weight: fusion::HYBRID_WEIGHT,
            rerank_weight: fusion::RERANK_WEIGHT,
        }
    }
}

impl From<&MatchingConfig> for ConfidenceCalibrator {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            hybrid_weight: config.hybrid_weight,
            rerank_weight: config.rerank_weight,
        }
    }
}

impl ConfidenceCalibrator {
    pub fn new(hybrid_weight: f32, rerank_weight: f32) -> Self {
        Self {
            hybrid_weight,
            rerank_weight,
        }
    }

    /// Deduplicate by identity key, keeping the higher hybrid score
    ///
    /// Runs before reranking so duplicate candidates never consume
    /// rerank budget. Input is expected sorted by hybrid score
    /// descending, so the first occurrence of a key is the one kept.
    pub fn dedup(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut seen: HashSet<String> = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| seen.insert(c.identity_key.clone()))
            .collect()
    }

    /// Blend hybrid and rerank scores into final confidence
    ///
    /// Candidates absent from `rerank_scores` (or all of them, when the
    /// map is None because the reranker degraded) fall back to the raw
    /// hybrid score with `rerank_score` left unset. Returns the top
    /// `n_results` by final confidence, descending, ties kept in input
    /// order.
    pub fn calibrate(
        &self,
        candidates: Vec<Candidate>,
        rerank_scores: Option<&HashMap<String, f32>>,
        n_results: usize,
    ) -> Vec<Candidate> {
        let mut calibrated: Vec<Candidate> = candidates
            .into_iter()
            .map(|mut c| {
                let rerank = rerank_scores.and_then(|scores| scores.get(&c.identity_key).copied());
                let confidence = match rerank {
                    Some(score) => {
                        self.hybrid_weight * c.hybrid_score + self.rerank_weight * score
                    },
                    None => c.hybrid_score,
                };

                // Inputs are bounded in [0, 1], so a confidence outside
                // that range is a scoring bug, not a data problem.
                assert!(
                    (-1e-6..=1.0 + 1e-6).contains(&confidence),
                    "Confidence {} out of range for candidate {}",
                    confidence,
                    c.identity_key
                );

                c.rerank_score = rerank;
                c.final_confidence = confidence.clamp(0.0, 1.0);
                c
            })
            .collect();

        calibrated.sort_by(|a, b| {
            b.final_confidence
                .partial_cmp(&a.final_confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        calibrated.truncate(n_results);

        debug_assert!(
            {
                let keys: HashSet<&str> =
                    calibrated.iter().map(|c| c.identity_key.as_str()).collect();
                keys.len() == calibrated.len()
            },
            "Duplicate identity keys after calibration"
        );

        calibrated
    }
}
