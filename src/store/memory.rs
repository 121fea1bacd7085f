//! Process-local store backing all three capabilities.
//!
//! All state sits behind one mutex, so every operation (including the
//! compare-and-set) is atomic with respect to every other.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::{ItemStore, MatchStore, PendingQueue, check_dimension, monotonic_now, new_record_id};
use crate::model::{Category, Item, ItemStatus, Match, NewMatch, NewPendingEntry, PendingEntry};

#[derive(Default)]
struct MemoryState {
    items: HashMap<(Category, String), Item>,
    matches: Vec<Match>,
    pending: Vec<PendingEntry>,
    last_match_at: Option<DateTime<Utc>>,
    closed: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    dimension: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects embeddings whose length is not `dimension`.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            dimension: Some(dimension),
        }
    }

    pub fn item_count(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn match_count(&self) -> usize {
        self.state.lock().matches.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Appends a match row without the duplicate or threshold checks.
    ///
    /// Models a writer that bypasses the engine (imports, manual fixes).
    pub fn insert_match_unchecked(&self, new: NewMatch) -> Match {
        let mut state = self.state.lock();
        let created_at = monotonic_now(state.last_match_at);
        state.last_match_at = Some(created_at);
        let stored = new.into_match(new_record_id(), created_at);
        state.matches.push(stored.clone());
        stored
    }

    fn lock_open(&self) -> StoreResult<parking_lot::MutexGuard<'_, MemoryState>> {
        let state = self.state.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    fn close_all(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            debug!("Memory store closed");
        }
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert(&self, item: Item) -> StoreResult<()> {
        if let Some(embedding) = &item.embedding {
            check_dimension(self.dimension, embedding)?;
        }

        let mut state = self.lock_open()?;
        let key = (item.category, item.id.clone());
        if state.items.contains_key(&key) {
            return Err(StoreError::ItemExists {
                category: item.category,
                id: item.id,
            });
        }
        state.items.insert(key, item);
        Ok(())
    }

    async fn get(&self, category: Category, id: &str) -> StoreResult<Item> {
        let state = self.lock_open()?;
        state
            .items
            .get(&(category, id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::ItemNotFound {
                category,
                id: id.to_string(),
            })
    }

    async fn update_embedding(
        &self,
        category: Category,
        id: &str,
        embedding: Vec<f32>,
    ) -> StoreResult<()> {
        check_dimension(self.dimension, &embedding)?;

        let mut state = self.lock_open()?;
        let item = state
            .items
            .get_mut(&(category, id.to_string()))
            .ok_or_else(|| StoreError::ItemNotFound {
                category,
                id: id.to_string(),
            })?;
        item.embedding = Some(embedding);
        Ok(())
    }

    async fn scan(&self, category: Category, status: ItemStatus) -> StoreResult<Vec<Item>> {
        let state = self.lock_open()?;
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|item| item.category == category && item.status == status)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn set_status(
        &self,
        category: Category,
        id: &str,
        expected: ItemStatus,
        new: ItemStatus,
    ) -> StoreResult<bool> {
        let mut state = self.lock_open()?;
        let item = state
            .items
            .get_mut(&(category, id.to_string()))
            .ok_or_else(|| StoreError::ItemNotFound {
                category,
                id: id.to_string(),
            })?;

        if item.status != expected {
            return Ok(false);
        }
        item.status = new;
        Ok(true)
    }

    async fn close(&self) -> StoreResult<()> {
        self.close_all();
        Ok(())
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn insert(&self, new: NewMatch) -> StoreResult<Match> {
        let mut state = self.lock_open()?;

        if state
            .matches
            .iter()
            .any(|m| m.lost_id == new.lost_id && m.found_id == new.found_id)
        {
            return Err(StoreError::DuplicateMatch {
                lost_id: new.lost_id,
                found_id: new.found_id,
            });
        }

        let created_at = monotonic_now(state.last_match_at);
        state.last_match_at = Some(created_at);

        let stored = new.into_match(new_record_id(), created_at);
        state.matches.push(stored.clone());
        Ok(stored)
    }

    async fn query_by_lost_id(&self, lost_id: &str) -> StoreResult<Vec<Match>> {
        let state = self.lock_open()?;
        Ok(state
            .matches
            .iter()
            .filter(|m| m.lost_id == lost_id)
            .cloned()
            .collect())
    }

    async fn query_by_found_id(&self, found_id: &str) -> StoreResult<Vec<Match>> {
        let state = self.lock_open()?;
        Ok(state
            .matches
            .iter()
            .filter(|m| m.found_id == found_id)
            .cloned()
            .collect())
    }

    async fn query_by_user(&self, user_id: &str) -> StoreResult<Vec<Match>> {
        let state = self.lock_open()?;
        Ok(state
            .matches
            .iter()
            .filter(|m| m.owner_user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn close(&self) -> StoreResult<()> {
        self.close_all();
        Ok(())
    }
}

#[async_trait]
impl PendingQueue for MemoryStore {
    async fn insert(&self, entry: NewPendingEntry) -> StoreResult<PendingEntry> {
        let mut state = self.lock_open()?;
        let stored = entry.into_entry(new_record_id());
        state.pending.push(stored.clone());
        Ok(stored)
    }

    async fn scan_all(&self) -> StoreResult<Vec<PendingEntry>> {
        let state = self.lock_open()?;
        Ok(state.pending.clone())
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut state = self.lock_open()?;
        let before = state.pending.len();
        state.pending.retain(|entry| entry.id != id);
        Ok(state.pending.len() != before)
    }

    async fn close(&self) -> StoreResult<()> {
        self.close_all();
        Ok(())
    }
}
