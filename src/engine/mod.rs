//! The matching engine.
//!
//! [`MatchEngine`] ties an [`Encoder`](crate::embedding::Encoder) to the three store
//! capabilities:
//!
//! 1. a submission is validated, fingerprinted and written back to its item
//! 2. WAITING items of the opposite category are scored with cosine similarity
//! 3. every score strictly above the threshold claims the candidate with a
//!    compare-and-set, records a [`Match`](crate::model::Match) and flips the
//!    submitted item to MATCHED
//!
//! Failed or invalid submissions land in the pending queue with a
//! [`ReasonCode`](crate::model::ReasonCode); [`MatchEngine::replay_pending`] retries
//! them. Every encoder and store call runs under
//! [`EngineConfig::operation_timeout`].

pub mod config;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use engine::MatchEngine;
pub use error::{EngineError, EngineResult};
pub use types::{EmbeddingResult, ReplayReport, Submission, ValidSubmission};
