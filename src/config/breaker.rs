//! Circuit breaker configuration

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Per-provider failure isolation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures within the monitoring window that open the circuit
    pub failure_threshold: u32,
    /// Failures older than this no longer count toward the threshold
    pub monitoring_window_ms: u64,
    /// Base wait before an open circuit admits a probe
    pub recovery_timeout_ms: u64,
    /// Cap on the exponentially-grown recovery timeout
    pub max_recovery_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            monitoring_window_ms: 60_000,
            recovery_timeout_ms: 10_000,
            max_recovery_timeout_ms: 300_000,
        }
    }
}

impl BreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "breaker.failure_threshold",
                "must be at least 1",
            ));
        }
        if self.recovery_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "breaker.recovery_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.max_recovery_timeout_ms < self.recovery_timeout_ms {
            return Err(ConfigError::invalid(
                "breaker.max_recovery_timeout_ms",
                "must be at least recovery_timeout_ms",
            ));
        }
        Ok(())
    }
}
