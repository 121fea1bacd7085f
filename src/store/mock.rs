//! Fault-injecting wrapper around [`MemoryStore`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::error::{StoreError, StoreResult};
use super::memory::MemoryStore;
use super::{ItemStore, MatchStore, PendingQueue};
use crate::model::{Category, Item, ItemStatus, Match, NewMatch, NewPendingEntry, PendingEntry};

/// Delegates to an inner [`MemoryStore`] unless a failure switch is set.
#[derive(Default)]
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    failing_embeddings: RwLock<HashSet<String>>,
    fail_match_inserts: AtomicBool,
    fail_pending_inserts: AtomicBool,
    fail_scans: AtomicBool,
    scan_delay: Mutex<Option<Duration>>,
    late_match_inserts: Mutex<Option<Duration>>,
    late_claims: RwLock<HashMap<String, Duration>>,
    failing_matched_writes: RwLock<HashSet<String>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &Arc<MemoryStore> {
        &self.inner
    }

    /// Fails `update_embedding` for this item id.
    pub fn fail_embedding_for(&self, id: &str) {
        self.failing_embeddings.write().insert(id.to_string());
    }

    pub fn fail_match_inserts(&self, fail: bool) {
        self.fail_match_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pending_inserts(&self, fail: bool) {
        self.fail_pending_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_scans(&self, fail: bool) {
        self.fail_scans.store(fail, Ordering::SeqCst);
    }

    /// Sleeps before every `scan`.
    pub fn delay_scans(&self, delay: Option<Duration>) {
        *self.scan_delay.lock() = delay;
    }

    /// Commits each match insert, then sleeps before answering.
    pub fn late_match_inserts(&self, delay: Option<Duration>) {
        *self.late_match_inserts.lock() = delay;
    }

    /// Commits WAITING -> MATCHED writes on this item, then sleeps before answering.
    pub fn late_claim_for(&self, id: &str, delay: Duration) {
        self.late_claims.write().insert(id.to_string(), delay);
    }

    /// Fails WAITING -> MATCHED writes for this item id without applying them.
    pub fn fail_matched_write_for(&self, id: &str) {
        self.failing_matched_writes.write().insert(id.to_string());
    }

    pub fn heal_matched_write_for(&self, id: &str) {
        self.failing_matched_writes.write().remove(id);
    }

    fn injected(operation: &str) -> StoreError {
        StoreError::Backend {
            reason: format!("injected {operation} failure"),
        }
    }
}

#[async_trait]
impl ItemStore for FlakyStore {
    async fn insert(&self, item: Item) -> StoreResult<()> {
        ItemStore::insert(&*self.inner, item).await
    }

    async fn get(&self, category: Category, id: &str) -> StoreResult<Item> {
        self.inner.get(category, id).await
    }

    async fn update_embedding(
        &self,
        category: Category,
        id: &str,
        embedding: Vec<f32>,
    ) -> StoreResult<()> {
        if self.failing_embeddings.read().contains(id) {
            return Err(Self::injected("update_embedding"));
        }
        self.inner.update_embedding(category, id, embedding).await
    }

    async fn scan(&self, category: Category, status: ItemStatus) -> StoreResult<Vec<Item>> {
        let delay = *self.scan_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(Self::injected("scan"));
        }
        self.inner.scan(category, status).await
    }

    async fn set_status(
        &self,
        category: Category,
        id: &str,
        expected: ItemStatus,
        new: ItemStatus,
    ) -> StoreResult<bool> {
        let claiming = expected == ItemStatus::Waiting && new == ItemStatus::Matched;
        if claiming && self.failing_matched_writes.read().contains(id) {
            return Err(Self::injected("set_status"));
        }

        let result = self.inner.set_status(category, id, expected, new).await;

        let late = self.late_claims.read().get(id).copied();
        if let (true, Some(delay)) = (claiming, late) {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn close(&self) -> StoreResult<()> {
        ItemStore::close(&*self.inner).await
    }
}

#[async_trait]
impl MatchStore for FlakyStore {
    async fn insert(&self, new: NewMatch) -> StoreResult<Match> {
        if self.fail_match_inserts.load(Ordering::SeqCst) {
            return Err(Self::injected("match insert"));
        }
        let result = MatchStore::insert(&*self.inner, new).await;

        let late = *self.late_match_inserts.lock();
        if let Some(delay) = late {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn query_by_lost_id(&self, lost_id: &str) -> StoreResult<Vec<Match>> {
        self.inner.query_by_lost_id(lost_id).await
    }

    async fn query_by_found_id(&self, found_id: &str) -> StoreResult<Vec<Match>> {
        self.inner.query_by_found_id(found_id).await
    }

    async fn query_by_user(&self, user_id: &str) -> StoreResult<Vec<Match>> {
        self.inner.query_by_user(user_id).await
    }

    async fn close(&self) -> StoreResult<()> {
        MatchStore::close(&*self.inner).await
    }
}

#[async_trait]
impl PendingQueue for FlakyStore {
    async fn insert(&self, entry: NewPendingEntry) -> StoreResult<PendingEntry> {
        if self.fail_pending_inserts.load(Ordering::SeqCst) {
            return Err(Self::injected("pending insert"));
        }
        PendingQueue::insert(&*self.inner, entry).await
    }

    async fn scan_all(&self) -> StoreResult<Vec<PendingEntry>> {
        self.inner.scan_all().await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.inner.delete(id).await
    }

    async fn close(&self) -> StoreResult<()> {
        PendingQueue::close(&*self.inner).await
    }
}
