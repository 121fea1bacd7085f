use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("invalid threshold {threshold}: must be a finite value in [-1.0, 1.0]")]
    InvalidThreshold { threshold: f32 },
}
