use std::sync::Arc;

use crate::engine::MatchEngine;

#[derive(Clone)]
pub struct HandlerState {
    pub engine: Arc<MatchEngine>,

    /// `"model"` or `"stub"`, reported by `/ready`.
    pub embedder_mode: &'static str,

    /// `"sqlite"` or `"memory"`, reported by `/ready`.
    pub storage_mode: &'static str,
}

impl HandlerState {
    pub fn new(engine: Arc<MatchEngine>) -> Self {
        Self {
            engine,
            embedder_mode: "model",
            storage_mode: "memory",
        }
    }

    pub fn with_modes(mut self, embedder_mode: &'static str, storage_mode: &'static str) -> Self {
        self.embedder_mode = embedder_mode;
        self.storage_mode = storage_mode;
        self
    }
}
