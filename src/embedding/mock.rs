//! Test encoders with caller-chosen vectors and failures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Encoder, EncodingError};

/// Encoder returning vectors registered per description.
///
/// Unregistered text encodes to `fallback` (if set) or fails with
/// [`EncodingError::InferenceFailed`].
pub struct ScriptedEncoder {
    dimension: usize,
    vectors: RwLock<HashMap<String, Vec<f32>>>,
    failing: RwLock<HashSet<String>>,
    fallback: Option<Vec<f32>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedEncoder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            fallback: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Registers the vector returned for `text`.
    pub fn with_vector(self, text: &str, vector: Vec<f32>) -> Self {
        self.set_vector(text, vector);
        self
    }

    pub fn with_fallback(mut self, vector: Vec<f32>) -> Self {
        self.fallback = Some(vector);
        self
    }

    /// Sleeps before answering, to exercise caller timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_vector(&self, text: &str, vector: Vec<f32>) {
        self.vectors.write().insert(text.to_string(), vector);
    }

    /// Makes every encode of `text` fail until [`heal`](Self::heal) is called.
    pub fn fail_on(&self, text: &str) {
        self.failing.write().insert(text.to_string());
    }

    pub fn heal(&self, text: &str) {
        self.failing.write().remove(text);
    }

    /// Number of `encode` calls observed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.read().contains(text) {
            return Err(EncodingError::InferenceFailed {
                reason: format!("scripted failure for '{text}'"),
            });
        }

        self.vectors
            .read()
            .get(text)
            .cloned()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| EncodingError::InferenceFailed {
                reason: format!("no scripted vector for '{text}'"),
            })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Encoder that always fails (models an unavailable embedding service).
pub struct FailingEncoder {
    dimension: usize,
    reason: String,
}

impl FailingEncoder {
    pub fn new(dimension: usize, reason: impl Into<String>) -> Self {
        Self {
            dimension,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Encoder for FailingEncoder {
    async fn encode(&self, _text: &str) -> Result<Vec<f32>, EncodingError> {
        Err(EncodingError::InferenceFailed {
            reason: self.reason.clone(),
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
