//! Persistence capabilities used by the matching engine.
//!
//! Three traits split the document store the engine talks to:
//!
//! - [`ItemStore`]: lost/found reports, partitioned by [`Category`]
//! - [`MatchStore`]: append-only match records
//! - [`PendingQueue`]: submissions awaiting a replay pass
//!
//! Two backends implement all three: [`MemoryStore`] (process-local) and
//! [`SqliteStore`] (durable). Both honour the same contract, exercised by the shared
//! tests in `tests.rs`.
//!
//! # Conditional status updates
//!
//! [`ItemStore::set_status`] is a compare-and-set: it only writes when the current
//! status equals `expected` and reports whether it did. The engine relies on this to
//! keep two concurrent submissions from both claiming the same candidate.

pub mod error;
pub mod memory;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod sqlite;


pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
#[cfg(any(test, feature = "mock"))]
pub use mock::FlakyStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::model::{Category, Item, ItemStatus, Match, NewMatch, NewPendingEntry, PendingEntry};

#[async_trait]
/// Lost and found reports.
pub trait ItemStore: Send + Sync {
    /// Registers a new report. Fails with [`StoreError::ItemExists`] on id reuse.
    async fn insert(&self, item: Item) -> StoreResult<()>;

    /// Fetches one report. Fails with [`StoreError::ItemNotFound`].
    async fn get(&self, category: Category, id: &str) -> StoreResult<Item>;

    /// Overwrites the fingerprint of an existing report.
    async fn update_embedding(
        &self,
        category: Category,
        id: &str,
        embedding: Vec<f32>,
    ) -> StoreResult<()>;

    /// Every report in `category` currently in `status`.
    async fn scan(&self, category: Category, status: ItemStatus) -> StoreResult<Vec<Item>>;

    /// Compare-and-set on the status field.
    ///
    /// Returns `Ok(false)` when the current status is not `expected`.
    async fn set_status(
        &self,
        category: Category,
        id: &str,
        expected: ItemStatus,
        new: ItemStatus,
    ) -> StoreResult<bool>;

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
/// Append-only match records.
pub trait MatchStore: Send + Sync {
    /// Persists a match, assigning its id and a non-decreasing `created_at`.
    ///
    /// Fails with [`StoreError::DuplicateMatch`] when the pair is already recorded.
    async fn insert(&self, new: NewMatch) -> StoreResult<Match>;

    async fn query_by_lost_id(&self, lost_id: &str) -> StoreResult<Vec<Match>>;

    async fn query_by_found_id(&self, found_id: &str) -> StoreResult<Vec<Match>>;

    async fn query_by_user(&self, user_id: &str) -> StoreResult<Vec<Match>>;

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
/// Deferred submissions, scanned in insertion order.
pub trait PendingQueue: Send + Sync {
    async fn insert(&self, entry: NewPendingEntry) -> StoreResult<PendingEntry>;

    async fn scan_all(&self) -> StoreResult<Vec<PendingEntry>>;

    /// Removes an entry. Returns `false` if it was already gone.
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Checks an embedding against an optional configured dimension.
pub(crate) fn check_dimension(expected: Option<usize>, embedding: &[f32]) -> StoreResult<()> {
    match expected {
        Some(expected) if expected != embedding.len() => Err(StoreError::InvalidDimension {
            expected,
            actual: embedding.len(),
        }),
        _ => Ok(()),
    }
}

/// Later of `now` and the previous timestamp, so per-store timestamps never go backwards.
pub(crate) fn monotonic_now(
    last: Option<chrono::DateTime<chrono::Utc>>,
) -> chrono::DateTime<chrono::Utc> {
    let now = chrono::Utc::now();
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

pub(crate) fn new_record_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
