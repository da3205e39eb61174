//! A/B experiment configuration

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// One configured A/B test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Test identifier (e.g., "premium-routing-2026q3")
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Arms of the test; weights must sum to 100
    pub variants: Vec<VariantConfig>,
}

fn default_enabled() -> bool {
    true
}

/// One arm of an A/B test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub id: String,
    /// Share of subjects assigned to this arm (0-100)
    pub weight: u32,
    /// Provider the router should prefer for subjects in this arm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_provider: Option<String>,
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid("experiments.id", "must not be empty"));
        }
        if self.variants.is_empty() {
            return Err(ConfigError::invalid(
                format!("experiments.{}.variants", self.id),
                "must have at least one variant",
            ));
        }
        let total: u32 = self.variants.iter().map(|v| v.weight).sum();
        if total != 100 {
            return Err(ConfigError::invalid(
                format!("experiments.{}.variants", self.id),
                format!("variant weights must sum to 100, got {}", total),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for variant in &self.variants {
            if variant.id.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("experiments.{}.variants.id", self.id),
                    "must not be empty",
                ));
            }
            if !seen.insert(variant.id.as_str()) {
                return Err(ConfigError::invalid(
                    format!("experiments.{}.variants", self.id),
                    format!("duplicate variant id '{}'", variant.id),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_arm_test() -> ExperimentConfig {
        ExperimentConfig {
            id: "routing-test".to_string(),
            enabled: true,
            variants: vec![
                VariantConfig {
                    id: "control".to_string(),
                    weight: 50,
                    preferred_provider: None,
                },
                VariantConfig {
                    id: "treatment".to_string(),
                    weight: 50,
                    preferred_provider: Some("anthropic-primary".to_string()),
                },
            ],
        }
    }

    #[test]
    fn balanced_weights_pass() {
        assert!(two_arm_test().validate().is_ok());
    }

    #[test]
    fn weights_not_summing_to_100_rejected() {
        let mut config = two_arm_test();
        config.variants[0].weight = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_variant_id_rejected() {
        let mut config = two_arm_test();
        config.variants[1].id = "control".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_variants_rejected() {
        let config = ExperimentConfig {
            id: "empty".to_string(),
            enabled: true,
            variants: vec![],
        };
        assert!(config.validate().is_err());
    }
}
