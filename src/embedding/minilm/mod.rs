//! MiniLM sentence encoder (BERT + mean pooling + L2 normalization).
//!
//! Use [`MiniLmConfig::stub`] for tests/examples without model files.

/// MiniLM configuration.
pub mod config;


pub use config::{MINILM_EMBEDDING_DIM, MINILM_MAX_SEQ_LEN, MiniLmConfig};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::embedding::Encoder;
use crate::embedding::bert::SentenceBert;
use crate::embedding::device::select_device;
use crate::embedding::error::EncodingError;
use crate::embedding::utils::load_tokenizer_with_truncation;

enum EncoderBackend {
    Model {
        model: Arc<SentenceBert>,
        tokenizer: Arc<Tokenizer>,
        device: Device,
    },
    Stub,
}

/// Description encoder used by the matching engine (supports stub mode).
pub struct MiniLmEncoder {
    backend: EncoderBackend,
    config: MiniLmConfig,
    closed: AtomicBool,
}

impl std::fmt::Debug for MiniLmEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniLmEncoder")
            .field(
                "backend",
                &match &self.backend {
                    EncoderBackend::Model { device, .. } => format!("Model({:?})", device),
                    EncoderBackend::Stub => "Stub".to_string(),
                },
            )
            .field("embedding_dim", &self.config.embedding_dim)
            .field("max_seq_len", &self.config.max_seq_len)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl MiniLmEncoder {
    /// Opens the encoder described by `config` (stub mode is supported).
    pub fn load(config: MiniLmConfig) -> Result<Self, EncodingError> {
        config.validate()?;

        if config.testing_stub {
            warn!("MiniLM encoder running in STUB mode (testing only)");
            return Ok(Self {
                backend: EncoderBackend::Stub,
                config,
                closed: AtomicBool::new(false),
            });
        }

        let device = select_device()?;
        debug!(?device, "Selected compute device for MiniLM");

        let model = SentenceBert::load(&config.model_dir, &device).map_err(|e| {
            EncodingError::ModelLoadFailed {
                reason: format!("Failed to load BERT weights: {}", e),
            }
        })?;

        if config.embedding_dim > model.hidden_size() {
            return Err(EncodingError::InvalidConfig {
                reason: format!(
                    "embedding_dim ({}) exceeds model hidden_size ({})",
                    config.embedding_dim,
                    model.hidden_size()
                ),
            });
        }

        let tokenizer = load_tokenizer_with_truncation(&config.model_dir, config.max_seq_len)
            .map_err(|e| EncodingError::TokenizationFailed {
                reason: format!("Failed to load tokenizer: {}", e),
            })?;

        info!(
            model_dir = %config.model_dir.display(),
            embedding_dim = config.embedding_dim,
            hidden_size = model.hidden_size(),
            max_seq_len = config.max_seq_len,
            "MiniLM encoder loaded"
        );

        Ok(Self {
            backend: EncoderBackend::Model {
                model: Arc::new(model),
                tokenizer: Arc::new(tokenizer),
                device,
            },
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Returns `true` if running in stub mode.
    pub fn is_stub(&self) -> bool {
        matches!(self.backend, EncoderBackend::Stub)
    }

    /// Returns the encoder configuration.
    pub fn config(&self) -> &MiniLmConfig {
        &self.config
    }

    /// Synchronous encode; runs inference on the calling thread.
    pub fn encode_blocking(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EncodingError::Closed);
        }

        match &self.backend {
            EncoderBackend::Model {
                model,
                tokenizer,
                device,
            } => encode_with_model(text, model, tokenizer, device, self.config.embedding_dim),
            EncoderBackend::Stub => Ok(encode_stub(text, self.config.embedding_dim)),
        }
    }
}

#[async_trait]
impl Encoder for MiniLmEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EncodingError::Closed);
        }

        match &self.backend {
            EncoderBackend::Model {
                model,
                tokenizer,
                device,
            } => {
                let model = Arc::clone(model);
                let tokenizer = Arc::clone(tokenizer);
                let device = device.clone();
                let dim = self.config.embedding_dim;
                let text = text.to_string();

                tokio::task::spawn_blocking(move || {
                    encode_with_model(&text, &model, &tokenizer, &device, dim)
                })
                .await
                .map_err(|e| EncodingError::InferenceFailed {
                    reason: format!("Encoder task failed: {}", e),
                })?
            }
            EncoderBackend::Stub => Ok(encode_stub(text, self.config.embedding_dim)),
        }
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    async fn close(&self) -> Result<(), EncodingError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("MiniLM encoder closed");
        }
        Ok(())
    }
}

fn encode_with_model(
    text: &str,
    model: &SentenceBert,
    tokenizer: &Tokenizer,
    device: &Device,
    embedding_dim: usize,
) -> Result<Vec<f32>, EncodingError> {
    let encoding =
        tokenizer
            .encode(text, true)
            .map_err(|e| EncodingError::TokenizationFailed {
                reason: e.to_string(),
            })?;

    if encoding.get_ids().is_empty() {
        return Ok(vec![0.0; embedding_dim]);
    }

    debug!(
        text_len = text.len(),
        token_count = encoding.get_ids().len(),
        "Generating embedding (BERT forward pass)"
    );

    let input_ids = Tensor::new(encoding.get_ids(), device)?.unsqueeze(0)?;
    let type_ids = Tensor::new(encoding.get_type_ids(), device)?.unsqueeze(0)?;
    let attention_mask = Tensor::new(encoding.get_attention_mask(), device)?.unsqueeze(0)?;

    let pooled = model
        .forward_pooled(&input_ids, &type_ids, &attention_mask)
        .map_err(|e| EncodingError::InferenceFailed {
            reason: format!("BERT forward pass failed: {}", e),
        })?;

    let mut embedding = pooled.squeeze(0)?.to_vec1::<f32>()?;
    embedding.truncate(embedding_dim);

    if embedding.len() != embedding_dim {
        return Err(EncodingError::DimensionMismatch {
            expected: embedding_dim,
            actual: embedding.len(),
        });
    }

    Ok(normalize(embedding))
}

/// First 8 bytes of the BLAKE3 digest, little-endian.
///
/// Stub fingerprints are persisted, so the seed must not change between builds.
pub(crate) fn stub_seed(text: &str) -> u64 {
    let digest = blake3::hash(text.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

fn encode_stub(text: &str, embedding_dim: usize) -> Vec<f32> {
    debug!(text_len = text.len(), "Generating stub embedding");

    let mut state = stub_seed(text);

    let mut embedding = Vec::with_capacity(embedding_dim);
    for _ in 0..embedding_dim {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let value = ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        embedding.push(value);
    }

    normalize(embedding)
}

fn normalize(mut embedding: Vec<f32>) -> Vec<f32> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm > 0.0 {
        for x in &mut embedding {
            *x /= norm;
        }
    }

    embedding
}
