use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time;
use tracing::{debug, error, info, instrument, warn};

use crate::constants::validate_embedding_dim;
use crate::embedding::{Encoder, EncodingError};
use crate::model::{Category, Item, ItemStatus, Match, NewMatch};
use crate::scoring::{PairVerdict, cosine_similarity};
use crate::store::{ItemStore, MatchStore, PendingQueue, StoreError, StoreResult};

use super::config::EngineConfig;
use super::error::{EngineError, EngineResult};
use super::types::{EmbeddingResult, ReplayReport, Submission, ValidSubmission};

/// Fingerprints reports, pairs them with opposite-category candidates and
/// records the matches.
///
/// Holds nothing beyond the injected capabilities and its config, so one engine
/// can serve any number of concurrent submissions and replays.
pub struct MatchEngine {
    encoder: Arc<dyn Encoder>,
    items: Arc<dyn ItemStore>,
    matches: Arc<dyn MatchStore>,
    pending: Arc<dyn PendingQueue>,
    config: EngineConfig,
    closed: AtomicBool,
}

impl std::fmt::Debug for MatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine")
            .field("config", &self.config)
            .field("encoder_dim", &self.encoder.dimension())
            .finish_non_exhaustive()
    }
}

impl MatchEngine {
    /// Wires the engine to its capabilities.
    ///
    /// Fails if the config is invalid or the encoder's output width differs from
    /// `config.embedding_dim`.
    pub fn new(
        encoder: Arc<dyn Encoder>,
        items: Arc<dyn ItemStore>,
        matches: Arc<dyn MatchStore>,
        pending: Arc<dyn PendingQueue>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        validate_embedding_dim(encoder.dimension(), config.embedding_dim).map_err(|e| {
            EngineError::InvalidConfig {
                reason: format!("encoder: {e}"),
            }
        })?;

        Ok(Self {
            encoder,
            items,
            matches,
            pending,
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Uses one backend for items, matches and the pending queue.
    pub fn with_store<S>(
        encoder: Arc<dyn Encoder>,
        store: Arc<S>,
        config: EngineConfig,
    ) -> EngineResult<Self>
    where
        S: ItemStore + MatchStore + PendingQueue + 'static,
    {
        let items: Arc<dyn ItemStore> = store.clone();
        let matches: Arc<dyn MatchStore> = store.clone();
        let pending: Arc<dyn PendingQueue> = store;
        Self::new(encoder, items, matches, pending, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fingerprints one report and matches it against the opposite category.
    ///
    /// Invalid or failed submissions are parked in the pending queue before the
    /// error is returned.
    #[instrument(
        skip(self, submission),
        fields(item_id = submission.item_id.as_deref().unwrap_or(""))
    )]
    pub async fn submit(&self, submission: Submission) -> EngineResult<EmbeddingResult> {
        let outcome = match submission.validate() {
            Ok(valid) => self.process(&valid).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(result) => {
                info!(
                    category = %result.category,
                    matches = result.matches.len(),
                    "Submission processed"
                );
                Ok(result)
            }
            Err(err) => match self.park(&submission, &err).await {
                Ok(()) => Err(err),
                Err(park_error) => Err(EngineError::Unparked {
                    cause: Box::new(err),
                    park_error,
                }),
            },
        }
    }

    /// Scores `vector` against every WAITING item of the opposite category and
    /// records a match for each score above the threshold.
    ///
    /// Candidates lost to a concurrent claim are skipped. Returns the matches
    /// created by this call.
    #[instrument(skip(self, vector, owner_user_id), fields(category = %category))]
    pub async fn match_against_candidates(
        &self,
        item_id: &str,
        category: Category,
        vector: &[f32],
        owner_user_id: Option<&str>,
    ) -> EngineResult<Vec<Match>> {
        let opposite = category.opposite();
        let candidates = self
            .store_call("scan", self.items.scan(opposite, ItemStatus::Waiting))
            .await?;
        debug!(candidates = candidates.len(), "Scanning candidates");

        let mut created = Vec::new();
        for candidate in &candidates {
            let Some(embedding) = candidate.embedding.as_deref() else {
                debug!(candidate = %candidate.id, "Candidate not fingerprinted yet");
                continue;
            };
            if embedding.len() != self.config.embedding_dim {
                warn!(
                    candidate = %candidate.id,
                    expected = self.config.embedding_dim,
                    actual = embedding.len(),
                    "Skipping candidate with wrong embedding dimension"
                );
                continue;
            }

            let score = match self.config.policy.evaluate(vector, embedding) {
                PairVerdict::Match { score } => score,
                PairVerdict::BelowThreshold { .. } | PairVerdict::Incomparable { .. } => continue,
            };

            match self
                .claim(item_id, category, &candidate.id, score, owner_user_id)
                .await
            {
                Ok(Some(stored)) => created.push(stored),
                Ok(None) => {}
                Err(EngineError::Conflict { category, id }) => {
                    debug!(%category, candidate = %id, "Candidate claimed elsewhere, skipping");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(created)
    }

    /// Reprocesses every pending entry, removing the ones that now succeed.
    ///
    /// Never aborts on a single entry. Entries with invalid fields stay queued.
    #[instrument(skip(self))]
    pub async fn replay_pending(&self) -> EngineResult<ReplayReport> {
        let entries = self
            .store_call("scan_pending", self.pending.scan_all())
            .await?;
        let mut report = ReplayReport::default();

        for entry in entries {
            let submission = Submission::from_pending(&entry);
            let valid = match submission.validate() {
                Ok(valid) => valid,
                Err(err) => {
                    debug!(entry_id = %entry.id, error = %err, "Skipping invalid pending entry");
                    report.skipped.push(entry.id);
                    continue;
                }
            };

            let result = match self.process(&valid).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(
                        entry_id = %entry.id,
                        doc_id = %valid.item_id,
                        error = %err,
                        "Replay failed, entry retained"
                    );
                    report.failed.push(entry.id);
                    continue;
                }
            };
            report.matches_created += result.matches.len();

            match self
                .store_call("delete_pending", self.pending.delete(&entry.id))
                .await
            {
                Ok(_) => report.processed.push(valid.item_id),
                Err(err) => {
                    warn!(
                        entry_id = %entry.id,
                        error = %err,
                        "Replayed entry could not be removed"
                    );
                    report.failed.push(entry.id);
                }
            }
        }

        info!(
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            matches = report.matches_created,
            "Replay finished"
        );
        Ok(report)
    }

    /// Matches recorded for a LOST item, restricted to scores above the threshold.
    #[instrument(skip(self))]
    pub async fn matches_for_item(&self, item_id: &str) -> EngineResult<Vec<Match>> {
        let rows = self
            .store_call("query_by_lost_id", self.matches.query_by_lost_id(item_id))
            .await?;
        let threshold = self.config.threshold();
        Ok(rows
            .into_iter()
            .filter(|m| m.exceeds_threshold(threshold))
            .collect())
    }

    /// Every match owned by `user_id`, whatever its score.
    #[instrument(skip(self))]
    pub async fn matches_for_user(&self, user_id: &str) -> EngineResult<Vec<Match>> {
        self.store_call("query_by_user", self.matches.query_by_user(user_id))
            .await
    }

    /// Registers a new report in WAITING status.
    #[instrument(skip(self, item), fields(item_id = %item.id, category = %item.category))]
    pub async fn register_item(&self, item: Item) -> EngineResult<Item> {
        if item.id.trim().is_empty() {
            return Err(EngineError::validation("missing id"));
        }
        if item.description.trim().is_empty() {
            return Err(EngineError::validation("missing description"));
        }
        if let Some(embedding) = &item.embedding {
            validate_embedding_dim(embedding.len(), self.config.embedding_dim)
                .map_err(|e| EngineError::validation(e.to_string()))?;
        }

        let item = item.with_status(ItemStatus::Waiting);
        self.store_call("insert_item", self.items.insert(item.clone()))
            .await?;
        debug!("Item registered");
        Ok(item)
    }

    /// Cosine similarity between the fingerprints of two descriptions.
    #[instrument(skip_all)]
    pub async fn compare(&self, first: &str, second: &str) -> EngineResult<f32> {
        if first.trim().is_empty() || second.trim().is_empty() {
            return Err(EngineError::validation("both descriptions are required"));
        }
        let a = self.encode(first).await?;
        let b = self.encode(second).await?;
        Ok(cosine_similarity(&a, &b))
    }

    /// Closes the encoder and every store. Returns the first failure.
    pub async fn close(&self) -> EngineResult<()> {
        self.closed.store(true, Ordering::Release);
        let encoder = self.encoder.close().await.map_err(EngineError::from);
        let items = self.items.close().await.map_err(EngineError::from);
        let matches = self.matches.close().await.map_err(EngineError::from);
        let pending = self.pending.close().await.map_err(EngineError::from);

        info!("Match engine closed");
        encoder.and(items).and(matches).and(pending)
    }

    async fn process(&self, submission: &ValidSubmission) -> EngineResult<EmbeddingResult> {
        let embedding = self.encode(&submission.description).await?;
        let persisted = self.persist_embedding(submission, &embedding).await?;

        let matches = self
            .match_against_candidates(
                &submission.item_id,
                submission.category,
                &embedding,
                persisted.owner.as_deref(),
            )
            .await?;

        if matches.is_empty() && persisted.status == Some(ItemStatus::Waiting) {
            self.settle_linked_item(submission.category, &submission.item_id)
                .await?;
        }

        Ok(EmbeddingResult {
            item_id: submission.item_id.clone(),
            category: submission.category,
            embedding,
            matches,
        })
    }

    /// Writes the fingerprint and resolves the match owner.
    ///
    /// Reports that were never registered are created on the fly.
    async fn persist_embedding(
        &self,
        submission: &ValidSubmission,
        embedding: &[f32],
    ) -> EngineResult<Persisted> {
        let category = submission.category;
        let id = submission.item_id.as_str();

        let existing = match self.store_call("get_item", self.items.get(category, id)).await {
            Ok(item) => Some(item),
            Err(EngineError::Store(err)) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };

        if let Some(item) = existing {
            self.store_call(
                "update_embedding",
                self.items.update_embedding(category, id, embedding.to_vec()),
            )
            .await?;
            return Ok(Persisted {
                owner: submission.user_id.clone().or(item.owner_user_id),
                status: Some(item.status),
            });
        }

        let mut item = Item::new(id, category, submission.description.as_str())
            .with_embedding(embedding.to_vec());
        item.owner_user_id = submission.user_id.clone();

        match self.store_call("insert_item", self.items.insert(item)).await {
            Ok(()) => debug!(%category, "Registered unseen item"),
            // Registered concurrently; fall back to the plain update.
            Err(EngineError::Store(StoreError::ItemExists { .. })) => {
                self.store_call(
                    "update_embedding",
                    self.items.update_embedding(category, id, embedding.to_vec()),
                )
                .await?;
            }
            Err(err) => return Err(err),
        }
        Ok(Persisted {
            owner: submission.user_id.clone(),
            status: None,
        })
    }

    /// Moves a WAITING item that already appears in a persisted match to MATCHED.
    ///
    /// Repairs the state left when the final status write of an earlier claim
    /// failed after its match row was committed.
    async fn settle_linked_item(&self, category: Category, id: &str) -> EngineResult<()> {
        let linked = self.linked_matches(category, id).await?;
        if linked.is_empty() {
            return Ok(());
        }

        info!(%category, id, matches = linked.len(), "Settling item left WAITING by a recorded match");
        self.mark_matched(category, id).await
    }

    async fn linked_matches(&self, category: Category, id: &str) -> EngineResult<Vec<Match>> {
        match category {
            Category::Lost => {
                self.store_call("query_matches", self.matches.query_by_lost_id(id))
                    .await
            }
            Category::Found => {
                self.store_call("query_matches", self.matches.query_by_found_id(id))
                    .await
            }
        }
    }

    async fn mark_matched(&self, category: Category, id: &str) -> EngineResult<()> {
        let flipped = self
            .store_call(
                "set_status",
                self.items
                    .set_status(category, id, ItemStatus::Waiting, ItemStatus::Matched),
            )
            .await?;
        if !flipped {
            debug!(%category, id, "Item already matched");
        }
        Ok(())
    }

    /// Claims one candidate and records the match.
    ///
    /// Returns `Ok(None)` if the candidate vanished, [`EngineError::Conflict`] if
    /// another writer got there first.
    async fn claim(
        &self,
        item_id: &str,
        category: Category,
        candidate_id: &str,
        score: f32,
        owner_user_id: Option<&str>,
    ) -> EngineResult<Option<Match>> {
        let opposite = category.opposite();
        let (lost_id, found_id) = category.order_pair(item_id, candidate_id);
        let conflict = || EngineError::Conflict {
            category: opposite,
            id: candidate_id.to_string(),
        };

        match self
            .store_call(
                "set_status",
                self.items
                    .set_status(opposite, candidate_id, ItemStatus::Waiting, ItemStatus::Matched),
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => return Err(conflict()),
            Err(EngineError::Store(err)) if err.is_not_found() => {
                warn!(candidate = %candidate_id, "Candidate disappeared before claim");
                return Ok(None);
            }
            // The write may still have landed after the deadline.
            Err(err) if err.is_timeout() => {
                if !self
                    .late_claim_landed(opposite, candidate_id, lost_id, found_id)
                    .await?
                {
                    return Err(err);
                }
                debug!(candidate = %candidate_id, "Adopting claim committed after timeout");
            }
            Err(err) => return Err(err),
        }

        let new = NewMatch::new(lost_id, found_id, score)
            .with_owner(owner_user_id.map(str::to_string));

        let stored = match self.store_call("insert_match", self.matches.insert(new)).await {
            Ok(stored) => stored,
            // The pair already exists, so both sides belong in MATCHED.
            Err(EngineError::Store(err)) if err.is_duplicate_match() => {
                self.mark_matched(category, item_id).await?;
                return Err(conflict());
            }
            Err(err) if err.is_timeout() => match self.find_pair(lost_id, found_id).await {
                Ok(Some(stored)) => {
                    debug!(match_id = %stored.id, "Match insert committed after timeout");
                    stored
                }
                Ok(None) => {
                    self.release(opposite, candidate_id).await;
                    return Err(err);
                }
                Err(lookup) => {
                    error!(
                        candidate = %candidate_id,
                        error = %lookup,
                        "Cannot tell whether the match landed, keeping the claim"
                    );
                    return Err(err);
                }
            },
            Err(err) => {
                self.release(opposite, candidate_id).await;
                return Err(err);
            }
        };

        self.mark_matched(category, item_id).await?;

        info!(
            match_id = %stored.id,
            lost_id = %stored.lost_id,
            found_id = %stored.found_id,
            score = stored.score,
            "Match recorded"
        );
        Ok(Some(stored))
    }

    /// Decides whether a timed-out claim on `candidate_id` took effect.
    ///
    /// A MATCHED candidate is ours unless a match row pairs it with another item.
    async fn late_claim_landed(
        &self,
        category: Category,
        candidate_id: &str,
        lost_id: &str,
        found_id: &str,
    ) -> EngineResult<bool> {
        let candidate = self
            .store_call("get_item", self.items.get(category, candidate_id))
            .await?;
        if candidate.status == ItemStatus::Waiting {
            return Ok(false);
        }

        let linked = self.linked_matches(category, candidate_id).await?;
        if linked.iter().any(|m| m.pair() != (lost_id, found_id)) {
            return Err(EngineError::Conflict {
                category,
                id: candidate_id.to_string(),
            });
        }
        Ok(true)
    }

    async fn find_pair(&self, lost_id: &str, found_id: &str) -> EngineResult<Option<Match>> {
        let rows = self
            .store_call("query_matches", self.matches.query_by_lost_id(lost_id))
            .await?;
        Ok(rows.into_iter().find(|m| m.found_id == found_id))
    }

    async fn release(&self, category: Category, id: &str) {
        let released = self
            .store_call(
                "set_status",
                self.items
                    .set_status(category, id, ItemStatus::Matched, ItemStatus::Waiting),
            )
            .await;

        match released {
            Ok(true) => debug!(%category, id, "Released candidate claim"),
            Ok(false) => warn!(%category, id, "Candidate claim already changed, not released"),
            Err(err) => error!(%category, id, error = %err, "Failed to release candidate claim"),
        }
    }

    async fn park(&self, submission: &Submission, cause: &EngineError) -> StoreResult<()> {
        let entry = submission.to_pending(cause.pending_reason());
        let code = entry.reason.code;
        let after = self.config.operation_timeout;

        let stored = time::timeout(after, self.pending.insert(entry))
            .await
            .map_err(|_| StoreError::Timeout {
                operation: "insert_pending",
                after,
            })
            .and_then(|inserted| inserted);

        match stored {
            Ok(stored) => {
                warn!(entry_id = %stored.id, %code, error = %cause, "Submission parked for replay");
                Ok(())
            }
            Err(err) => {
                error!(
                    %code,
                    error = %cause,
                    park_error = %err,
                    "Submission failed and could not be parked"
                );
                Err(err)
            }
        }
    }

    async fn encode(&self, text: &str) -> EngineResult<Vec<f32>> {
        let after = self.config.operation_timeout;
        let vector = time::timeout(after, self.encoder.encode(text))
            .await
            .map_err(|_| EncodingError::Timeout { after })??;

        validate_embedding_dim(vector.len(), self.config.embedding_dim).map_err(|_| {
            EncodingError::DimensionMismatch {
                expected: self.config.embedding_dim,
                actual: vector.len(),
            }
        })?;
        Ok(vector)
    }

    async fn store_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> EngineResult<T> {
        let after = self.config.operation_timeout;
        let result = time::timeout(after, call)
            .await
            .map_err(|_| StoreError::Timeout { operation, after })?;
        Ok(result?)
    }
}

/// Result of writing a submission's fingerprint.
struct Persisted {
    /// Owner recorded on any match this submission creates.
    owner: Option<String>,
    /// Status before this submission, `None` for a newly created item.
    status: Option<ItemStatus>,
}
