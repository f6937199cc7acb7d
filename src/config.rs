//! Storage configuration
//!
//! Loaded from a JSON file. Every field is optional; missing fields take
//! the defaults below.
//!
//! ```json
//! {
//!   "memory_limit_bytes": 268435456,
//!   "quota_timeout_ms": 60000,
//!   "max_iterators": 1024,
//!   "max_formats": 65535,
//!   "statement_pool_size": 64,
//!   "log_level": "info"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::FormatRegistry;
use crate::observability::{log_event_with_fields, Event, Severity};

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings of one storage context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Hard quota limit for tuple memory (default 256MB)
    #[serde(default = "default_memory_limit")]
    pub memory_limit_bytes: usize,

    /// How long a throttled writer waits for memory (default 60s)
    #[serde(default = "default_quota_timeout_ms")]
    pub quota_timeout_ms: u64,

    /// Live tuple iterators allowed at once
    #[serde(default = "default_max_iterators")]
    pub max_iterators: usize,

    /// Live tuple formats allowed at once, including the runtime format
    #[serde(default = "default_max_formats")]
    pub max_formats: usize,

    /// Statement buffers kept for reuse
    #[serde(default = "default_statement_pool_size")]
    pub statement_pool_size: usize,

    /// Minimum log severity: trace, info, warn, error or fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_memory_limit() -> usize {
    268435456
} // 256MB
fn default_quota_timeout_ms() -> u64 {
    60_000
}
fn default_max_iterators() -> usize {
    1024
}
fn default_max_formats() -> usize {
    FormatRegistry::MAX_FORMATS
}
fn default_statement_pool_size() -> usize {
    64
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: default_memory_limit(),
            quota_timeout_ms: default_quota_timeout_ms(),
            max_iterators: default_max_iterators(),
            max_formats: default_max_formats(),
            statement_pool_size: default_statement_pool_size(),
            log_level: default_log_level(),
        }
    }
}

impl StorageConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json(&content)?;
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("log_level", &config.log_level),
                ("memory_limit_bytes", &config.memory_limit_bytes.to_string()),
                ("path", &path.display().to_string()),
            ],
        );
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: StorageConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.memory_limit_bytes == 0 {
            return Err(ConfigError::Invalid(
                "memory_limit_bytes must be > 0".to_string(),
            ));
        }

        if self.max_iterators == 0 {
            return Err(ConfigError::Invalid("max_iterators must be > 0".to_string()));
        }

        if self.max_formats == 0 || self.max_formats > FormatRegistry::MAX_FORMATS {
            return Err(ConfigError::Invalid(format!(
                "max_formats must be between 1 and {}",
                FormatRegistry::MAX_FORMATS
            )));
        }

        self.log_severity()?;
        Ok(())
    }

    /// `log_level` as a logger severity
    pub fn log_severity(&self) -> ConfigResult<Severity> {
        self.log_level.parse().map_err(ConfigError::Invalid)
    }

    pub fn quota_timeout(&self) -> Duration {
        Duration::from_millis(self.quota_timeout_ms)
    }
}
