use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Downstream confirmation state of a match. Only `Waiting` is written here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Waiting,
    Confirmed,
    Rejected,
}

impl MatchStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Waiting => "waiting",
            MatchStatus::Confirmed => "confirmed",
            MatchStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(MatchStatus::Waiting),
            "confirmed" => Ok(MatchStatus::Confirmed),
            "rejected" => Ok(MatchStatus::Rejected),
            other => Err(ParseEnumError::new("match status", other)),
        }
    }
}

/// A match as handed to [`MatchStore::insert`](crate::store::MatchStore::insert).
///
/// The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMatch {
    pub lost_id: String,
    pub found_id: String,
    pub score: f32,
    pub owner_user_id: Option<String>,
    pub status: MatchStatus,
}

impl NewMatch {
    pub fn new(lost_id: impl Into<String>, found_id: impl Into<String>, score: f32) -> Self {
        Self {
            lost_id: lost_id.into(),
            found_id: found_id.into(),
            score,
            owner_user_id: None,
            status: MatchStatus::Waiting,
        }
    }

    pub fn with_owner(mut self, owner_user_id: Option<String>) -> Self {
        self.owner_user_id = owner_user_id;
        self
    }

    /// Attaches the store-assigned identity.
    pub fn into_match(self, id: String, created_at: DateTime<Utc>) -> Match {
        Match {
            id,
            lost_id: self.lost_id,
            found_id: self.found_id,
            score: self.score,
            owner_user_id: self.owner_user_id,
            status: self.status,
            created_at,
        }
    }
}

/// A persisted pairing of one LOST and one FOUND item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub lost_id: String,
    pub found_id: String,
    pub score: f32,
    #[serde(rename = "userId")]
    pub owner_user_id: Option<String>,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

impl Match {
    /// `true` if the score clears `threshold` (strictly).
    #[inline]
    pub fn exceeds_threshold(&self, threshold: f32) -> bool {
        self.score > threshold
    }

    pub fn pair(&self) -> (&str, &str) {
        (&self.lost_id, &self.found_id)
    }
}
