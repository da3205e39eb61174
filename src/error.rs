//! Error taxonomy for orchestration calls.
//!
//! Only the variants here cross the crate boundary. Per-candidate failures
//! are recovered inside the router and surface only as entries in the
//! `AllProvidersFailed` trail.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal errors returned to callers of [`crate::service::AiService`].
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Malformed task descriptor or request. Fails fast, no cost incurred.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Cost guard rejected the request before dispatch. Never retried.
    #[error("Cost limit exceeded for organization '{organization_id}': {reason}")]
    CostLimitExceeded {
        organization_id: String,
        reason: String,
    },

    /// The organization has too many requests in flight.
    #[error("Rate limit exceeded for organization '{organization_id}'")]
    RateLimited { organization_id: String },

    /// No registered (provider, model) pair matches the task requirements.
    #[error("No candidate providers match task '{task_type}' at quality '{quality}'")]
    NoCandidates { task_type: String, quality: String },

    /// Every candidate was attempted or skipped; carries the full trail.
    #[error("All {} candidate providers failed", .trail.len())]
    AllProvidersFailed { trail: Vec<AttemptFailure> },

    /// A proposed configuration update failed validation.
    #[error(transparent)]
    Configuration(#[from] crate::config::ConfigError),
}

impl OrchestrationError {
    /// Machine-readable kind for the caller-facing error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::CostLimitExceeded { .. } => "cost_limit_exceeded",
            Self::RateLimited { .. } => "rate_limited",
            Self::NoCandidates { .. } => "no_candidates",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::Configuration(_) => "invalid_configuration",
        }
    }

    /// True when every trail entry was a circuit-open skip, i.e. the fleet
    /// is unhealthy rather than the budget being exhausted.
    pub fn is_all_circuits_open(&self) -> bool {
        match self {
            Self::AllProvidersFailed { trail } => {
                !trail.is_empty()
                    && trail
                        .iter()
                        .all(|a| a.reason == FailureReason::CircuitOpen)
            }
            _ => false,
        }
    }
}

/// One attempted or skipped candidate in a failed dispatch.
///
/// Adapter errors are normalized into `reason` and a redacted `message`
/// before inclusion; raw provider payloads never reach the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub provider_id: String,
    pub model_id: String,
    pub reason: FailureReason,
    pub message: String,
}

/// Normalized reason a candidate did not produce a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Skipped: circuit breaker refused the provider.
    CircuitOpen,
    /// Skipped: cost guard rejected this candidate's estimate.
    CostRejected,
    /// Skipped: provider at its concurrency cap.
    Saturated,
    /// Dispatched: deadline exceeded.
    Timeout,
    /// Dispatched: network-level failure.
    Network,
    /// Dispatched: provider returned a non-2xx response.
    Upstream,
    /// Dispatched: response did not match the expected shape.
    InvalidResponse,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CircuitOpen => "circuit_open",
            Self::CostRejected => "cost_rejected",
            Self::Saturated => "saturated",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Upstream => "upstream",
            Self::InvalidResponse => "invalid_response",
        };
        f.write_str(s)
    }
}

impl AttemptFailure {
    /// Normalize an adapter error into a trail entry.
    pub fn from_adapter_error(
        provider_id: &str,
        model_id: &str,
        error: &crate::provider::AdapterError,
    ) -> Self {
        use crate::provider::AdapterError;
        let (reason, message) = match error {
            AdapterError::Timeout(ms) => {
                (FailureReason::Timeout, format!("timed out after {}ms", ms))
            }
            AdapterError::Network(_) => (FailureReason::Network, "network error".to_string()),
            AdapterError::Upstream { status, .. } => (
                FailureReason::Upstream,
                format!("provider returned status {}", status),
            ),
            AdapterError::InvalidResponse(_) => (
                FailureReason::InvalidResponse,
                "unparseable provider response".to_string(),
            ),
            AdapterError::Unsupported(op) => (
                FailureReason::InvalidResponse,
                format!("operation '{}' not supported", op),
            ),
            AdapterError::Configuration(_) => (
                FailureReason::InvalidResponse,
                "adapter misconfigured".to_string(),
            ),
        };
        Self {
            provider_id: provider_id.to_string(),
            model_id: model_id.to_string(),
            reason,
            message,
        }
    }
}
