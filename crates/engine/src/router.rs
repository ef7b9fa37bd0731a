//! Decision routing
//!
//! Maps the top candidate's confidence (and stock availability) to a
//! workflow decision: auto-approve the match, queue it for human
//! review, or ask the customer to clarify.

use ordermatch_config::constants::routing;
use ordermatch_config::MatchingConfig;
use ordermatch_core::{AvailabilityCheck, Candidate, Decision};

/// Threshold-driven decision router
#[derive(Debug, Clone)]
pub struct DecisionRouter {
    /// Minimum confidence for auto-approval (inclusive)
    pub auto_approve_threshold: f32,
    /// Minimum confidence for human review (inclusive)
    pub human_review_threshold: f32,
}

impl Default for DecisionRouter {
    fn default() -> Self {
        Self {
            auto_approve_threshold: routing::AUTO_APPROVE_THRESHOLD,
            human_review_threshold: routing::HUMAN_REVIEW_THRESHOLD,
        }
    }
}

impl From<&MatchingConfig> for DecisionRouter {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            auto_approve_threshold: config.auto_approve_threshold,
            human_review_threshold: config.human_review_threshold,
        }
    }
}

impl DecisionRouter {
    pub fn new(auto_approve_threshold: f32, human_review_threshold: f32) -> Self {
        Self {
            auto_approve_threshold,
            human_review_threshold,
        }
    }

    /// Route based on the top candidate's confidence
    ///
    /// Auto-approval additionally requires a passing availability check;
    /// a failed or unavailable check downgrades to human review rather
    /// than approving an order that cannot be fulfilled.
    pub fn route(
        &self,
        candidates: &[Candidate],
        availability: Option<&dyn AvailabilityCheck>,
        requested_quantity: u32,
    ) -> (Decision, String) {
        let top = match candidates.first() {
            Some(top) => top,
            None => {
                return (
                    Decision::ClarificationNeeded,
                    "No catalog items matched the request".to_string(),
                );
            },
        };

        if top.final_confidence >= self.auto_approve_threshold {
            return match availability {
                Some(check) => {
                    if check.is_available(&top.identity_key, requested_quantity) {
                        (
                            Decision::AutoApprove,
                            format!(
                                "Confidence {:.2} meets auto-approve threshold and stock is available",
                                top.final_confidence
                            ),
                        )
                    } else {
                        (
                            Decision::HumanReview,
                            format!(
                                "Confidence {:.2} meets auto-approve threshold but stock check failed",
                                top.final_confidence
                            ),
                        )
                    }
                },
                None => (
                    Decision::HumanReview,
                    format!(
                        "Confidence {:.2} meets auto-approve threshold but availability is unknown",
                        top.final_confidence
                    ),
                ),
            };
        }

        if top.final_confidence >= self.human_review_threshold {
            return (
                Decision::HumanReview,
                format!(
                    "Confidence {:.2} is below the auto-approve threshold",
                    top.final_confidence
                ),
            );
        }

        (
            Decision::ClarificationNeeded,
            format!(
                "Confidence {:.2} is too low for a reliable match",
                top.final_confidence
            ),
        )
    }
}
