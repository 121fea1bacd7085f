use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Which side of the lost/found ledger a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Lost,
    Found,
}

impl Category {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Lost => "lost",
            Category::Found => "found",
        }
    }

    /// The category an item of this category is scored against.
    #[inline]
    pub fn opposite(&self) -> Category {
        match self {
            Category::Lost => Category::Found,
            Category::Found => Category::Lost,
        }
    }

    /// Orders `(this_id, other_id)` into `(lost_id, found_id)`.
    pub fn order_pair<'a>(&self, this_id: &'a str, other_id: &'a str) -> (&'a str, &'a str) {
        match self {
            Category::Lost => (this_id, other_id),
            Category::Found => (other_id, this_id),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lost" => Ok(Category::Lost),
            "found" => Ok(Category::Found),
            other => Err(ParseEnumError::new("category", other)),
        }
    }
}

/// Matching lifecycle of a single report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Waiting,
    Matched,
}

impl ItemStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Waiting => "waiting",
            ItemStatus::Matched => "matched",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(ItemStatus::Waiting),
            "matched" => Ok(ItemStatus::Matched),
            other => Err(ParseEnumError::new("item status", other)),
        }
    }
}

/// A lost or found report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub status: ItemStatus,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// A fresh, unfingerprinted report in WAITING status.
    pub fn new(id: impl Into<String>, category: Category, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category,
            description: description.into(),
            embedding: None,
            status: ItemStatus::Waiting,
            owner_user_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_owner(mut self, user_id: impl Into<String>) -> Self {
        self.owner_user_id = Some(user_id.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }

    #[inline]
    pub fn is_fingerprinted(&self) -> bool {
        self.embedding.is_some()
    }
}
