use thiserror::Error;

use crate::embedding::EncodingError;
use crate::model::{Category, PendingReason, ReasonCode};
use crate::store::StoreError;

#[derive(Debug, Error)]
/// Errors returned by [`MatchEngine`](super::MatchEngine).
pub enum EngineError {
    /// The submission is malformed. Never retried automatically.
    #[error("invalid submission: {reason}")]
    Validation {
        /// Which field failed.
        reason: String,
    },

    /// The encoder failed or timed out.
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// A store call failed or timed out.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// A compare-and-set lost a race for this item.
    #[error("{category} item {id} was claimed concurrently")]
    Conflict {
        /// Partition of the contested item.
        category: Category,
        /// Contested item id.
        id: String,
    },

    /// A submission failed and writing its pending entry failed as well.
    #[error("{cause}; could not be parked: {park_error}")]
    Unparked {
        /// Original failure.
        cause: Box<EngineError>,
        /// Pending-queue write failure.
        park_error: StoreError,
    },

    /// Engine settings are unusable.
    #[error("invalid engine configuration: {reason}")]
    InvalidConfig {
        /// Error message.
        reason: String,
    },
}

impl EngineError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// `true` when the caller, not the system, is at fault.
    pub fn is_client_error(&self) -> bool {
        match self {
            EngineError::Unparked { cause, .. } => cause.is_client_error(),
            other => matches!(other, EngineError::Validation { .. }),
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            EngineError::Unparked { cause, .. } => cause.is_timeout(),
            other => matches!(
                other,
                EngineError::Encoding(EncodingError::Timeout { .. })
                    | EngineError::Store(StoreError::Timeout { .. })
            ),
        }
    }

    /// For errors from [`submit`](super::MatchEngine::submit): `false` when the
    /// submission never reached the pending queue.
    pub fn is_parked(&self) -> bool {
        !matches!(self, EngineError::Unparked { .. })
    }

    /// The underlying failure, looking through [`EngineError::Unparked`].
    pub fn cause(&self) -> &EngineError {
        match self {
            EngineError::Unparked { cause, .. } => cause,
            other => other,
        }
    }

    /// Machine-readable code recorded on the pending entry for this failure.
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            EngineError::Unparked { cause, .. } => cause.reason_code(),
            EngineError::Validation { .. } => ReasonCode::InvalidFields,
            _ if self.is_timeout() => ReasonCode::Timeout,
            EngineError::Encoding(_) => ReasonCode::EncodingFailed,
            EngineError::Store(_) | EngineError::Conflict { .. } | EngineError::InvalidConfig { .. } => {
                ReasonCode::StoreFailed
            }
        }
    }

    pub fn pending_reason(&self) -> PendingReason {
        match self {
            EngineError::Validation { .. } => PendingReason::invalid_fields(),
            other => PendingReason::new(other.reason_code(), other.to_string()),
        }
    }
}

/// Convenience result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
