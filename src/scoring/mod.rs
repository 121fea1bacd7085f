//! Pair scoring and threshold policy.
//!
//! [`cosine_similarity`] turns two fingerprints into a score in `[-1, 1]`;
//! [`MatchPolicy`] decides whether that score is strong enough to persist a match.
//!
//! # Threshold semantics
//!
//! The comparison is strict: a score equal to the threshold is **not** a match.
//! Degenerate inputs (zero norm, length mismatch, empty vectors) score `0.0` and are
//! never classified as a match by [`MatchPolicy::evaluate`], whatever the threshold.

pub mod error;
pub mod policy;
pub mod similarity;
pub mod types;


pub use error::ScoringError;
pub use policy::MatchPolicy;
pub use similarity::cosine_similarity;
pub use types::PairVerdict;
