//! Executor Configuration
//!
//! Target database, streaming buffer size and logging settings for
//! `PipelineExecutor`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Pipeline executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Database resource name (default: "projects/(default)/databases/(default)")
    #[serde(default = "default_database")]
    pub database: String,

    /// Capacity of the channel backing pull-mode result streams (default: 64)
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Minimum severity that is logged (default: INFO)
    #[serde(default = "default_log_level")]
    pub log_level: Severity,

    /// Log each serialized request at TRACE (default: false)
    #[serde(default)]
    pub log_requests: bool,
}

fn default_database() -> String {
    "projects/(default)/databases/(default)".to_string()
}

fn default_stream_buffer() -> usize {
    64
}

fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            stream_buffer: default_stream_buffer(),
            log_level: default_log_level(),
            log_requests: false,
        }
    }
}

impl ExecutorConfig {
    /// Config targeting a specific database
    pub fn for_database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Default::default()
        }
    }

    /// Parses and validates a JSON config document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ExecutorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.trim().is_empty() {
            return Err(ConfigError::Invalid("database must not be empty".into()));
        }
        if self.stream_buffer == 0 {
            return Err(ConfigError::Invalid("stream_buffer must be positive".into()));
        }
        Ok(())
    }
}
