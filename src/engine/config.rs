use std::time::Duration;

use crate::config::Config;
use crate::constants::{DEFAULT_EMBEDDING_DIM, DEFAULT_OPERATION_TIMEOUT_MS, validate_dimension};
use crate::scoring::{MatchPolicy, ScoringError};

use super::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
/// Runtime settings for [`MatchEngine`](super::MatchEngine).
pub struct EngineConfig {
    /// Threshold policy applied to every candidate.
    pub policy: MatchPolicy,
    /// Required embedding length. Candidates of other lengths are skipped.
    pub embedding_dim: usize,
    /// Deadline for each encoder or store call.
    pub operation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::default(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }
}

impl EngineConfig {
    /// Builds engine settings from the server configuration.
    pub fn from_config(config: &Config) -> Result<Self, ScoringError> {
        Ok(Self {
            policy: MatchPolicy::new(config.match_threshold)?,
            embedding_dim: config.embedding_dim,
            operation_timeout: config.operation_timeout,
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Result<Self, ScoringError> {
        self.policy = MatchPolicy::new(threshold)?;
        Ok(self)
    }

    pub fn with_embedding_dim(mut self, embedding_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.policy.threshold()
    }

    pub fn validate(&self) -> EngineResult<()> {
        validate_dimension(self.embedding_dim).map_err(|e| EngineError::InvalidConfig {
            reason: e.to_string(),
        })?;

        if self.operation_timeout.is_zero() {
            return Err(EngineError::InvalidConfig {
                reason: "operation timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
