//! Domain records shared by the stores, the engine and the gateway.
//!
//! - [`Item`] is a lost or found report plus its fingerprint.
//! - [`Match`] pairs one LOST item with one FOUND item.
//! - [`PendingEntry`] is a submission parked for a later replay pass.

mod item;
mod pending;
mod record;


pub use item::{Category, Item, ItemStatus};
pub use pending::{NewPendingEntry, PendingEntry, PendingReason, ReasonCode};
pub use record::{Match, MatchStatus, NewMatch};

use thiserror::Error;

/// Returned when a wire/database string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
