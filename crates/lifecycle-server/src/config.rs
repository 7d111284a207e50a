//! Server configuration
//!
//! Loaded from an optional TOML or JSON file named by `LIFECYCLE_CONFIG`,
//! then overridden field by field from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_CONFIG: &str = "LIFECYCLE_CONFIG";
pub const ENV_ADDR: &str = "LIFECYCLE_ADDR";
pub const ENV_DB: &str = "LIFECYCLE_DB";
pub const ENV_LOG: &str = "LIFECYCLE_LOG";

/// Runtime settings for the lifecycle server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind_addr: String,
    /// SQLite database file
    pub database_path: PathBuf,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// How long SQLite waits on a locked database
    pub busy_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            database_path: default_database_path(),
            log_filter: "info,tower_http=debug".to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

/// `<data dir>/lifecycle/lifecycle.db`, or the working directory when the
/// platform has no data dir.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lifecycle")
        .join("lifecycle.db")
}

impl ServerConfig {
    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json_str)?)
    }

    /// Read a config file; `.json` files are parsed as JSON, anything else as TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_toml(&contents),
        }
    }

    /// File named by `LIFECYCLE_CONFIG` (or defaults), then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(ENV_CONFIG) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `lookup`, keyed by the `LIFECYCLE_*` names.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup(ENV_ADDR) {
            self.bind_addr = addr;
        }
        if let Some(db) = lookup(ENV_DB) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("bind_addr must not be empty".to_string()));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database_path must not be empty".to_string()));
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid("busy_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Configuration loading or validation error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization failed: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
