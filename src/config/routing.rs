//! Routing configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::ConfigError;

/// Deployment-level routing preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CostOptimization {
    /// Favor the cheapest capable candidate
    Cost,
    /// Favor the lowest-latency candidate
    Speed,
    #[default]
    Balanced,
}

impl FromStr for CostOptimization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cost" => Ok(CostOptimization::Cost),
            "speed" => Ok(CostOptimization::Speed),
            "balanced" => Ok(CostOptimization::Balanced),
            _ => Err(format!("Invalid cost optimization: {}", s)),
        }
    }
}

/// Request routing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Scoring profile for candidate ordering
    pub cost_optimization: CostOptimization,
    /// Deadline for a single dispatch attempt
    pub request_timeout_ms: u64,
    /// Score bonus applied to a variant's preferred provider (0-100)
    pub variant_preference_bonus: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            cost_optimization: CostOptimization::Balanced,
            request_timeout_ms: 30_000,
            variant_preference_bonus: 15,
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "routing.request_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.request_timeout_ms > 600_000 {
            return Err(ConfigError::invalid(
                "routing.request_timeout_ms",
                "must be at most 600000 (10 minutes)",
            ));
        }
        if self.variant_preference_bonus > 100 {
            return Err(ConfigError::invalid(
                "routing.variant_preference_bonus",
                "must be 0-100",
            ));
        }
        Ok(())
    }
}
