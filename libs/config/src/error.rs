//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while layering, binding or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Layered configuration could not be built
    #[error("Failed to build configuration: {0}")]
    Build(#[from] config_crate::ConfigError),

    /// A configuration file exists but could not be read
    #[error("Failed to read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A configuration file is not valid JSON
    #[error("Invalid JSON in configuration file {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Malformed command-line override
    #[error("Invalid command line argument: {message}")]
    CommandLine { message: String },

    /// A section could not be bound to its typed options
    #[error("Failed to bind configuration section {section}: {source}")]
    Binding {
        section: String,
        source: serde_json::Error,
    },

    /// Structurally invalid configuration values
    #[error("Invalid configuration: {message}")]
    Invalid {
        message: String,
        field: Option<String>,
    },
}

impl ConfigError {
    /// Create an invalid-configuration error
    pub fn invalid(message: &str, field: Option<&str>) -> Self {
        Self::Invalid {
            message: message.to_string(),
            field: field.map(str::to_string),
        }
    }
}
