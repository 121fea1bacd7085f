use tracing::debug;

use super::error::ScoringError;
use super::similarity::cosine_similarity;
use super::types::PairVerdict;

/// Strict-threshold match policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    threshold: f32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: crate::constants::DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl MatchPolicy {
    pub fn new(threshold: f32) -> Result<Self, ScoringError> {
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(ScoringError::InvalidThreshold { threshold });
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// `true` if `score` is strictly above the threshold.
    #[inline]
    pub fn is_match(&self, score: f32) -> bool {
        score > self.threshold
    }

    /// Scores a pair of fingerprints and classifies the result.
    pub fn evaluate(&self, query: &[f32], candidate: &[f32]) -> PairVerdict {
        if query.len() != candidate.len() {
            return PairVerdict::Incomparable {
                query_dim: query.len(),
                candidate_dim: candidate.len(),
            };
        }

        if is_zero_norm(query) || is_zero_norm(candidate) {
            return PairVerdict::BelowThreshold { score: 0.0 };
        }

        let score = cosine_similarity(query, candidate);
        if self.is_match(score) {
            PairVerdict::Match { score }
        } else {
            debug!(score, threshold = self.threshold, "Pair below threshold");
            PairVerdict::BelowThreshold { score }
        }
    }
}

fn is_zero_norm(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}
