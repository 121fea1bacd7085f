//! Text fingerprinting.
//!
//! - [`Encoder`] is the capability the matching engine depends on.
//! - [`minilm`] provides the production implementation (BERT + mean pooling, with a
//!   deterministic stub mode when no model is configured).

/// Sentence-level BERT wrapper (mean pooled).
pub mod bert;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
mod error;
/// MiniLM sentence encoder.
pub mod minilm;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
/// Tokenizer loading helpers.
pub mod utils;

pub use error::EncodingError;
pub use minilm::{MINILM_EMBEDDING_DIM, MINILM_MAX_SEQ_LEN, MiniLmConfig, MiniLmEncoder};
#[cfg(any(test, feature = "mock"))]
pub use mock::{FailingEncoder, ScriptedEncoder};

use async_trait::async_trait;

#[async_trait]
/// Maps a description to a fixed-length fingerprint.
///
/// Implementations must be deterministic for identical input so that a replayed
/// submission reproduces the vector written on the first attempt.
pub trait Encoder: Send + Sync {
    /// Encodes `text` into exactly [`dimension`](Encoder::dimension) floats.
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EncodingError>;

    /// Output dimension `D`.
    fn dimension(&self) -> usize;

    /// Releases model resources. Later `encode` calls fail with [`EncodingError::Closed`].
    async fn close(&self) -> Result<(), EncodingError> {
        Ok(())
    }
}
