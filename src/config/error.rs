//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// IO error reading configuration
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// A specific field failed validation. The previous configuration
    /// stays active when this is returned from an update.
    #[error("Invalid configuration field '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
