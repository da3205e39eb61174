//! Configuration module for the orchestration layer
//!
//! Provides layered configuration loading from files, environment variables,
//! and defaults.
//!
//! # Configuration Precedence
//!
//! 1. Programmatic updates via `AiService::update_configuration` (highest)
//! 2. Environment variables (`SWITCHBOARD_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! Configuration is consumed as an immutable snapshot: callers clone an
//! `Arc<OrchestratorConfig>` at the start of a request and never observe a
//! partially-applied update.

pub mod breaker;
pub mod cache;
pub mod cost;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod provider;
pub mod routing;

pub use breaker::BreakerConfig;
pub use cache::{CacheConfig, RateLimitConfig};
pub use cost::{CostConfig, CostEnforcement};
pub use error::ConfigError;
pub use experiment::{ExperimentConfig, VariantConfig};
pub use logging::{LogFormat, LoggingConfig};
pub use provider::{ModelConfig, ProviderConfig, ProviderKind};
pub use routing::{CostOptimization, RoutingConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the orchestration layer.
///
/// # Example
///
/// ```rust
/// use switchboard::config::OrchestratorConfig;
///
/// let config = OrchestratorConfig::default();
/// assert_eq!(config.routing.request_timeout_ms, 30_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Configured provider backends
    pub providers: Vec<ProviderConfig>,
    /// Candidate ordering and dispatch deadlines
    pub routing: RoutingConfig,
    /// Budget limits and enforcement mode
    pub cost: CostConfig,
    /// Circuit breaker thresholds
    pub breaker: BreakerConfig,
    /// Response cache settings
    pub cache: CacheConfig,
    /// Per-organization admission settings
    pub rate_limit: RateLimitConfig,
    /// A/B tests influencing routing
    pub experiments: Vec<ExperimentConfig>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file.
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supports SWITCHBOARD_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("SWITCHBOARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SWITCHBOARD_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(opt) = std::env::var("SWITCHBOARD_COST_OPTIMIZATION") {
            if let Ok(o) = opt.parse() {
                self.routing.cost_optimization = o;
            }
        }
        self
    }

    /// Validate the whole configuration.
    ///
    /// Returns the first offending field; an update built on a config that
    /// fails here must not be applied (apply is all-or-nothing).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            provider.validate()?;
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::invalid(
                    "providers",
                    format!("duplicate provider id '{}'", provider.id),
                ));
            }
        }
        self.routing.validate()?;
        self.cost.validate()?;
        self.breaker.validate()?;
        self.cache.validate()?;
        self.rate_limit.validate()?;
        for experiment in &self.experiments {
            experiment.validate()?;
        }
        for experiment in &self.experiments {
            for variant in &experiment.variants {
                if let Some(preferred) = &variant.preferred_provider {
                    if !self.providers.iter().any(|p| &p.id == preferred) {
                        return Err(ConfigError::invalid(
                            format!("experiments.{}.variants.{}", experiment.id, variant.id),
                            format!("preferred_provider '{}' is not configured", preferred),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
