//! Reunite library crate (used by the server binary and integration tests).
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`Config`], [`ConfigError`] - Server configuration
//! - [`Item`], [`Match`], [`PendingEntry`] - Persisted records
//! - [`MatchEngine`], [`EngineConfig`], [`Submission`] - Matching workflow
//!
//! ## Embedding & Scoring
//! - [`Encoder`], [`MiniLmEncoder`], [`MiniLmConfig`] - Description fingerprints
//! - [`MatchPolicy`], [`cosine_similarity`] - Pair verdicts
//!
//! ## Storage
//! - [`ItemStore`], [`MatchStore`], [`PendingQueue`] - Capability traits
//! - [`MemoryStore`], [`SqliteStore`] - Backends
//!
//! ## Test/Mock Support
//! Scripted encoders and a fault-injecting store are available behind
//! `#[cfg(any(test, feature = "mock"))]`.

pub mod config;
pub mod constants;
pub mod embedding;
pub mod engine;
pub mod gateway;
pub mod model;
pub mod scoring;
pub mod store;

pub use config::{Config, ConfigError};
pub use constants::{
    DEFAULT_EMBEDDING_DIM, DEFAULT_MATCH_THRESHOLD, DimValidationError, validate_dimension,
    validate_embedding_dim,
};
pub use embedding::{
    Encoder, EncodingError, MINILM_EMBEDDING_DIM, MINILM_MAX_SEQ_LEN, MiniLmConfig,
    MiniLmEncoder,
};
#[cfg(any(test, feature = "mock"))]
pub use embedding::{FailingEncoder, ScriptedEncoder};
pub use engine::{
    EmbeddingResult, EngineConfig, EngineError, EngineResult, MatchEngine, ReplayReport,
    Submission, ValidSubmission,
};
pub use gateway::{
    GatewayError, HandlerState, REUNITE_STATUS_HEADER, REUNITE_STATUS_MATCHED,
    REUNITE_STATUS_NOT_READY, REUNITE_STATUS_OK, REUNITE_STATUS_READY, create_router_with_state,
};
pub use model::{
    Category, Item, ItemStatus, Match, MatchStatus, NewMatch, NewPendingEntry, ParseEnumError,
    PendingEntry, PendingReason, ReasonCode,
};
pub use scoring::{MatchPolicy, PairVerdict, ScoringError, cosine_similarity};
#[cfg(any(test, feature = "mock"))]
pub use store::FlakyStore;
pub use store::{
    ItemStore, MatchStore, MemoryStore, PendingQueue, SqliteStore, StoreError, StoreResult,
};
