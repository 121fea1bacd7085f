use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Machine-readable cause recorded on every pending entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    InvalidFields,
    EncodingFailed,
    StoreFailed,
    Timeout,
}

impl ReasonCode {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::InvalidFields => "INVALID_FIELDS",
            ReasonCode::EncodingFailed => "ENCODING_FAILED",
            ReasonCode::StoreFailed => "STORE_FAILED",
            ReasonCode::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INVALID_FIELDS" => Ok(ReasonCode::InvalidFields),
            "ENCODING_FAILED" => Ok(ReasonCode::EncodingFailed),
            "STORE_FAILED" => Ok(ReasonCode::StoreFailed),
            "TIMEOUT" => Ok(ReasonCode::Timeout),
            other => Err(ParseEnumError::new("reason code", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReason {
    pub code: ReasonCode,
    pub detail: String,
}

impl PendingReason {
    pub fn new(code: ReasonCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    pub fn invalid_fields() -> Self {
        Self::new(ReasonCode::InvalidFields, "invalid fields")
    }
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.detail)
    }
}

/// A pending entry before the queue assigns its id.
///
/// Fields are kept exactly as submitted, so any of them may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPendingEntry {
    pub doc_id: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub reason: PendingReason,
}

impl NewPendingEntry {
    pub fn into_entry(self, id: String) -> PendingEntry {
        PendingEntry {
            id,
            doc_id: self.doc_id,
            description: self.description,
            category: self.category,
            user_id: self.user_id,
            timestamp: self.timestamp,
            reason: self.reason,
        }
    }
}

/// A submission parked for the next replay pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    pub id: String,
    pub doc_id: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub reason: PendingReason,
}
