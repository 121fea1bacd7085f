#[derive(Debug, Clone, Copy, PartialEq)]
/// Outcome of scoring one query/candidate pair.
pub enum PairVerdict {
    /// Score strictly above the threshold.
    Match {
        /// Cosine similarity.
        score: f32,
    },
    /// Score at or below the threshold (includes degenerate zero-norm pairs).
    BelowThreshold {
        /// Cosine similarity.
        score: f32,
    },
    /// Vectors of different length; never scored.
    Incomparable {
        query_dim: usize,
        candidate_dim: usize,
    },
}

impl PairVerdict {
    /// Returns `true` for [`PairVerdict::Match`].
    pub fn is_match(&self) -> bool {
        matches!(self, PairVerdict::Match { .. })
    }

    /// Returns the score (if one was computed).
    pub fn score(&self) -> Option<f32> {
        match self {
            PairVerdict::Match { score } | PairVerdict::BelowThreshold { score } => Some(*score),
            PairVerdict::Incomparable { .. } => None,
        }
    }

    /// Returns a short debug string.
    pub fn debug_status(&self) -> &'static str {
        match self {
            PairVerdict::Match { .. } => "MATCH",
            PairVerdict::BelowThreshold { .. } => "BELOW_THRESHOLD",
            PairVerdict::Incomparable { .. } => "INCOMPARABLE",
        }
    }
}

impl std::fmt::Display for PairVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairVerdict::Match { score } => write!(f, "MATCH (score: {:.4})", score),
            PairVerdict::BelowThreshold { score } => {
                write!(f, "BELOW_THRESHOLD (score: {:.4})", score)
            }
            PairVerdict::Incomparable {
                query_dim,
                candidate_dim,
            } => write!(f, "INCOMPARABLE ({} vs {})", query_dim, candidate_dim),
        }
    }
}
