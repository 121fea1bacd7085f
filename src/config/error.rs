//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort { value: String },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// A numeric variable could not be parsed.
    #[error("failed to parse {name}='{value}': {reason}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Threshold is not a finite value in `[-1, 1]`.
    #[error("invalid match threshold {value}: must be within [-1, 1]")]
    InvalidThreshold { value: f32 },

    #[error("embedding dimension must be greater than zero")]
    ZeroDimension,

    #[error("operation timeout must be greater than zero")]
    ZeroTimeout,

    /// Specified path does not exist on the filesystem.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// Path exists but is not a file (when a file was expected).
    #[error("path is not a file: {path}")]
    NotAFile { path: PathBuf },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}
