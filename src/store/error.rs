use std::time::Duration;
use thiserror::Error;

use crate::model::Category;

#[derive(Debug, Error)]
/// Errors returned by item, match and pending-queue stores.
pub enum StoreError {
    /// No item with this id exists in the category.
    #[error("{category} item not found: {id}")]
    ItemNotFound {
        /// Partition searched.
        category: Category,
        /// Requested id.
        id: String,
    },

    /// An item with this id already exists in the category.
    #[error("{category} item already exists: {id}")]
    ItemExists {
        /// Partition.
        category: Category,
        /// Conflicting id.
        id: String,
    },

    /// A match for this `(lost_id, found_id)` pair is already recorded.
    #[error("match already recorded for lost={lost_id} found={found_id}")]
    DuplicateMatch {
        /// LOST side of the pair.
        lost_id: String,
        /// FOUND side of the pair.
        found_id: String,
    },

    /// Embedding length differs from the store's configured dimension.
    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension {
        /// Configured dimension.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// Caller-imposed deadline elapsed.
    #[error("store operation '{operation}' timed out after {after:?}")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Budget that elapsed.
        after: Duration,
    },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// A persisted row could not be decoded.
    #[error("corrupt record in '{table}': {reason}")]
    Corrupt {
        /// Table name.
        table: &'static str,
        /// Decode failure.
        reason: String,
    },

    /// SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Backend failure not covered above (task panics, injected faults).
    #[error("store backend failure: {reason}")]
    Backend {
        /// Error message.
        reason: String,
    },
}

impl StoreError {
    /// `true` for the duplicate-pair rejection the engine treats as a lost race.
    pub fn is_duplicate_match(&self) -> bool {
        matches!(self, StoreError::DuplicateMatch { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::ItemNotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout { .. })
    }
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
