//! Defaults shared by the config layer, the encoder and the engine.
//!
//! Every stored fingerprint has exactly `embedding_dim` floats, fixed at
//! startup. [`validate_embedding_dim`] guards the places a vector crosses a
//! boundary (encoder output, registration, store writes).

use thiserror::Error;

/// Output width of the MiniLM sentence encoder.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Strict lower bound a similarity score must exceed to produce a match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;

/// Per-call budget for encoder and store operations.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_MAX_SEQ_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimValidationError {
    #[error("embedding dimension cannot be zero")]
    ZeroDimension,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Rejects a zero configured dimension.
pub fn validate_dimension(embedding_dim: usize) -> Result<(), DimValidationError> {
    if embedding_dim == 0 {
        return Err(DimValidationError::ZeroDimension);
    }
    Ok(())
}

/// Checks a vector length against the configured dimension.
///
/// ```
/// use reunite::constants::{validate_embedding_dim, DEFAULT_EMBEDDING_DIM};
///
/// validate_embedding_dim(384, DEFAULT_EMBEDDING_DIM).unwrap();
/// assert!(validate_embedding_dim(768, DEFAULT_EMBEDDING_DIM).is_err());
/// ```
pub fn validate_embedding_dim(actual: usize, expected: usize) -> Result<(), DimValidationError> {
    if actual != expected {
        return Err(DimValidationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimension_rejected() {
        assert_eq!(validate_dimension(0), Err(DimValidationError::ZeroDimension));
        assert!(validate_dimension(2).is_ok());
    }

    #[test]
    fn test_length_mismatch_names_both_sides() {
        let err = validate_embedding_dim(768, 384).unwrap_err();
        assert_eq!(
            err,
            DimValidationError::DimensionMismatch {
                expected: 384,
                actual: 768
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("384") && msg.contains("768"));
    }
}
