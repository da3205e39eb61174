//! Error types for adapter operations.

use thiserror::Error;

/// Errors that can occur while calling a provider backend.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Network connectivity error (DNS, connection refused, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded deadline.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Provider returned an error response (4xx, 5xx).
    #[error("Provider error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Operation not supported by this adapter.
    #[error("Operation '{0}' not supported by this adapter")]
    Unsupported(&'static str),

    /// Provider response doesn't match expected format.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Adapter configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AdapterError {
    /// Map a reqwest transport error, distinguishing timeouts.
    pub fn from_reqwest(error: reqwest::Error, timeout_ms: u64) -> Self {
        if error.is_timeout() {
            AdapterError::Timeout(timeout_ms)
        } else {
            AdapterError::Network(error.to_string())
        }
    }
}
