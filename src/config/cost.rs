//! Cost guard configuration

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// How cost-limit violations are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CostEnforcement {
    /// Reject requests that would exceed a limit
    #[default]
    Enforce,
    /// Log the would-have-been-blocked decision and approve anyway.
    /// Internal testing only; must not be reachable by ordinary callers,
    /// so it is selectable exclusively through configuration.
    Observe,
}

/// Budget enforcement configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Whether the cost guard runs at all
    pub enabled: bool,
    /// Maximum estimated cost of a single request, USD
    pub per_request_limit: f64,
    /// Rolling daily spend limit per organization, USD
    pub daily_limit: f64,
    /// Rolling monthly spend limit per organization, USD
    pub monthly_limit: f64,
    pub enforcement: CostEnforcement,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_request_limit: 1.0,
            daily_limit: 50.0,
            monthly_limit: 1000.0,
            enforcement: CostEnforcement::Enforce,
        }
    }
}

impl CostConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_request_limit < 0.0 || !self.per_request_limit.is_finite() {
            return Err(ConfigError::invalid(
                "cost.per_request_limit",
                "must be a non-negative amount",
            ));
        }
        if self.daily_limit < 0.0 || !self.daily_limit.is_finite() {
            return Err(ConfigError::invalid(
                "cost.daily_limit",
                "must be a non-negative amount",
            ));
        }
        if self.monthly_limit < 0.0 || !self.monthly_limit.is_finite() {
            return Err(ConfigError::invalid(
                "cost.monthly_limit",
                "must be a non-negative amount",
            ));
        }
        if self.monthly_limit < self.daily_limit {
            return Err(ConfigError::invalid(
                "cost.monthly_limit",
                "must be at least the daily limit",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(CostConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_limit_rejected() {
        let config = CostConfig {
            daily_limit: -5.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn monthly_below_daily_rejected() {
        let config = CostConfig {
            daily_limit: 100.0,
            monthly_limit: 50.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn enforcement_serializes_lowercase() {
        let toml = toml::to_string(&CostConfig::default()).unwrap();
        assert!(toml.contains("enforcement = \"enforce\""));
    }
}
