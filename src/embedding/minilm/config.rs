use std::path::{Path, PathBuf};

use crate::embedding::error::EncodingError;

/// Default MiniLM embedding dimension.
pub const MINILM_EMBEDDING_DIM: usize = crate::constants::DEFAULT_EMBEDDING_DIM;

/// Default MiniLM max sequence length (tokens).
pub const MINILM_MAX_SEQ_LEN: usize = crate::constants::DEFAULT_MAX_SEQ_LEN;

const REQUIRED_FILES: [&str; 3] = ["config.json", "model.safetensors", "tokenizer.json"];

#[derive(Debug, Clone)]
/// Configuration for [`MiniLmEncoder`](super::MiniLmEncoder).
pub struct MiniLmConfig {
    /// Directory holding `config.json`, `model.safetensors` and `tokenizer.json`.
    pub model_dir: PathBuf,
    /// Max tokens to consider.
    pub max_seq_len: usize,
    /// Output embedding dimension.
    pub embedding_dim: usize,
    /// If true, run in deterministic stub mode (no model files required).
    pub testing_stub: bool,
}

impl Default for MiniLmConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::new(),
            max_seq_len: MINILM_MAX_SEQ_LEN,
            embedding_dim: MINILM_EMBEDDING_DIM,
            testing_stub: false,
        }
    }
}

impl MiniLmConfig {
    /// Env var used to locate the model directory.
    pub const ENV_MODEL_PATH: &'static str = "REUNITE_MODEL_PATH";

    /// Creates a config for a model directory.
    pub fn new<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            model_dir: model_dir.into(),
            ..Default::default()
        }
    }

    /// Reads the model directory from the environment; stub mode when unset or blank.
    pub fn from_env() -> Self {
        std::env::var(Self::ENV_MODEL_PATH)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self::new)
            .unwrap_or_else(Self::stub)
    }

    /// Creates a stub config (no model files; produces deterministic embeddings).
    pub fn stub() -> Self {
        Self {
            testing_stub: true,
            ..Default::default()
        }
    }

    pub fn with_embedding_dim(mut self, embedding_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }

    /// Validates required fields for the selected mode.
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.embedding_dim == 0 {
            return Err(EncodingError::InvalidConfig {
                reason: "embedding_dim must be greater than zero".to_string(),
            });
        }

        if self.testing_stub {
            return Ok(());
        }

        if self.max_seq_len == 0 {
            return Err(EncodingError::InvalidConfig {
                reason: "max_seq_len must be greater than zero".to_string(),
            });
        }

        if self.model_dir.as_os_str().is_empty() {
            return Err(EncodingError::InvalidConfig {
                reason: "model_dir is required (stubbing is disabled)".to_string(),
            });
        }

        if !self.model_dir.is_dir() {
            return Err(EncodingError::ModelNotFound {
                path: self.model_dir.clone(),
            });
        }

        if let Some(missing) = self.missing_file() {
            return Err(EncodingError::ModelNotFound { path: missing });
        }

        Ok(())
    }

    /// Returns `true` if every required model file is present.
    pub fn model_available(&self) -> bool {
        !self.model_dir.as_os_str().is_empty() && self.missing_file().is_none()
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    fn missing_file(&self) -> Option<PathBuf> {
        REQUIRED_FILES
            .iter()
            .map(|name| self.model_dir.join(name))
            .find(|path| !path.is_file())
    }
}
