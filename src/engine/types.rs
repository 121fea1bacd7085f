use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::{Category, Match, NewPendingEntry, PendingEntry, PendingReason};

use super::error::{EngineError, EngineResult};

/// A fingerprinting request exactly as received.
///
/// Fields stay raw so an invalid request can be parked verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "docId")]
    pub item_id: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<String>,
    pub user_id: Option<String>,
}

impl Submission {
    pub fn new(
        item_id: impl Into<String>,
        description: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            item_id: Some(item_id.into()),
            description: Some(description.into()),
            category: Some(category.as_str().to_string()),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Rebuilds the submission a pending entry was created from.
    pub fn from_pending(entry: &PendingEntry) -> Self {
        Self {
            item_id: entry.doc_id.clone(),
            description: entry.description.clone(),
            category: entry.category.clone(),
            user_id: entry.user_id.clone(),
        }
    }

    pub(crate) fn to_pending(&self, reason: PendingReason) -> NewPendingEntry {
        NewPendingEntry {
            doc_id: self.item_id.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            user_id: self.user_id.clone(),
            timestamp: Utc::now(),
            reason,
        }
    }

    /// Checks required fields. Category must be exactly `lost` or `found`.
    pub fn validate(&self) -> EngineResult<ValidSubmission> {
        let item_id = self
            .item_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| EngineError::validation("missing docId"))?;

        let description = self
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| EngineError::validation("missing description"))?;

        let category = self
            .category
            .as_deref()
            .ok_or_else(|| EngineError::validation("missing type"))?
            .parse::<Category>()
            .map_err(|e| EngineError::validation(e.to_string()))?;

        Ok(ValidSubmission {
            item_id: item_id.to_string(),
            description: description.to_string(),
            category,
            user_id: self.user_id.clone().filter(|u| !u.is_empty()),
        })
    }
}

/// A submission whose required fields are present and well-formed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub item_id: String,
    pub description: String,
    pub category: Category,
    pub user_id: Option<String>,
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingResult {
    pub item_id: String,
    pub category: Category,
    pub embedding: Vec<f32>,
    /// Matches created by this submission (not pre-existing ones).
    pub matches: Vec<Match>,
}

/// Summary of one replay pass over the pending queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    /// Item ids whose entries were reprocessed and removed.
    pub processed: Vec<String>,
    /// Entry ids left in place because the stored fields are invalid.
    pub skipped: Vec<String>,
    /// Entry ids that failed again and were retained.
    pub failed: Vec<String>,
    pub matches_created: usize,
}

impl ReplayReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
