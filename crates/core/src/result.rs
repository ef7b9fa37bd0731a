//! Match output types consumed by downstream collaborators

use serde::{Deserialize, Serialize};

/// Routing decision for a match result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Confidence cleared the auto-approve threshold and stock is available
    AutoApprove,
    /// Mid-tier confidence, or high confidence with failed/unknown stock
    HumanReview,
    /// Low confidence or no candidates at all
    ClarificationNeeded,
}

impl Decision {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AutoApprove => "Auto Approve",
            Self::HumanReview => "Human Review",
            Self::ClarificationNeeded => "Clarification Needed",
        }
    }
}

/// A scored catalog candidate for one query
///
/// `semantic_score` and `keyword_score` are raw index outputs (arbitrary
/// range, 0.0 when the item was absent from that index's result set).
/// `hybrid_score` and `final_confidence` are normalized to [0,1].
/// `rerank_score` is `None` when the reranker was unavailable or timed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Catalog item identity key
    pub identity_key: String,
    /// Item description (carried for reranking and review display)
    pub text: String,
    /// Raw similarity from the embedding index
    pub semantic_score: f32,
    /// Raw BM25 score from the keyword index
    pub keyword_score: f32,
    /// Normalized fusion of both signals, [0,1]
    pub hybrid_score: f32,
    /// Cross-encoder relevance, [0,1]; None in degraded mode
    pub rerank_score: Option<f32>,
    /// Calibrated confidence driving the routing decision, [0,1]
    pub final_confidence: f32,
}

/// Final output of the match pipeline
///
/// Invariants: candidates are sorted by `final_confidence` descending and
/// no two candidates share an `identity_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Ranked candidates, best first
    pub candidates: Vec<Candidate>,
    /// Routing decision derived from the top candidate
    pub decision: Decision,
    /// Human-readable explanation of the decision
    pub decision_reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_serializes_screaming_snake() {
        let json = serde_json::to_string(&Decision::AutoApprove).unwrap();
        assert_eq!(json, "\"AUTO_APPROVE\"");
        let json = serde_json::to_string(&Decision::ClarificationNeeded).unwrap();
        assert_eq!(json, "\"CLARIFICATION_NEEDED\"");
    }

    #[test]
    fn test_result_roundtrip() {
        let result = MatchResult {
            candidates: vec![Candidate {
                identity_key: "T-100".to_string(),
                text: "Black Cotton Woven Tag".to_string(),
                semantic_score: 0.86,
                keyword_score: 1.2,
                hybrid_score: 1.0,
                rerank_score: Some(0.97),
                final_confidence: 0.98,
            }],
            decision: Decision::AutoApprove,
            decision_reason: "top candidate T-100 at 0.98 with stock available".to_string(),
        };

        let json = serde_json::to_string(&result).unwrap();
        let parsed: MatchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.candidates[0].identity_key, "T-100");
        assert_eq!(parsed.decision, Decision::AutoApprove);
    }
}
