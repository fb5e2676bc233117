//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file did not parse
    #[error("Failed to parse {format} config: {message}")]
    Parse {
        /// Format attempted
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// File extension not recognized
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Environment override could not be applied
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name
        var: String,
        /// Rejected value
        value: String,
    },

    /// Values failed validation
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl From<ConfigError> for gateway_core::GatewayError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}
