//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `REUNITE_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_EMBEDDING_DIM, DEFAULT_MATCH_THRESHOLD, DEFAULT_OPERATION_TIMEOUT_MS,
};

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `REUNITE_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// SQLite database file. `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,

    /// MiniLM model directory (`config.json`, `model.safetensors`, `tokenizer.json`).
    pub model_path: Option<PathBuf>,

    /// Scores must be strictly above this to match. Default: `0.5`.
    pub match_threshold: f32,

    /// Embedding length. Default: `384`.
    pub embedding_dim: usize,

    /// Budget for each encoder or store call. Default: 10 s.
    pub operation_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            database_path: None,
            model_path: None,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "REUNITE_PORT";
    const ENV_BIND_ADDR: &'static str = "REUNITE_BIND_ADDR";
    const ENV_DATABASE_PATH: &'static str = "REUNITE_DATABASE_PATH";
    const ENV_MODEL_PATH: &'static str = "REUNITE_MODEL_PATH";
    const ENV_MATCH_THRESHOLD: &'static str = "REUNITE_MATCH_THRESHOLD";
    const ENV_EMBEDDING_DIM: &'static str = "REUNITE_EMBEDDING_DIM";
    const ENV_OPERATION_TIMEOUT_MS: &'static str = "REUNITE_OPERATION_TIMEOUT_MS";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let database_path = Self::parse_optional_path_from_env(Self::ENV_DATABASE_PATH);
        let model_path = Self::parse_optional_path_from_env(Self::ENV_MODEL_PATH);
        let match_threshold =
            Self::parse_number_from_env(Self::ENV_MATCH_THRESHOLD, defaults.match_threshold)?;
        let embedding_dim =
            Self::parse_number_from_env(Self::ENV_EMBEDDING_DIM, defaults.embedding_dim)?;
        let timeout_ms = Self::parse_number_from_env(
            Self::ENV_OPERATION_TIMEOUT_MS,
            DEFAULT_OPERATION_TIMEOUT_MS,
        )?;

        Ok(Self {
            port,
            bind_addr,
            database_path,
            model_path,
            match_threshold,
            embedding_dim,
            operation_timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Validates paths and numeric ranges (does not create anything).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.match_threshold.is_finite() || !(-1.0..=1.0).contains(&self.match_threshold) {
            return Err(ConfigError::InvalidThreshold {
                value: self.match_threshold,
            });
        }

        if self.embedding_dim == 0 {
            return Err(ConfigError::ZeroDimension);
        }

        if self.operation_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        if let Some(ref path) = self.database_path
            && path.is_dir()
        {
            return Err(ConfigError::NotAFile { path: path.clone() });
        }

        if let Some(ref path) = self.model_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_dir() {
                return Err(ConfigError::NotADirectory { path: path.clone() });
            }
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_number_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidNumber {
                    name: var_name,
                    value,
                    reason: e.to_string(),
                }),
            Err(_) => Ok(default),
        }
    }
}
