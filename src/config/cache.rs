//! Response cache configuration

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Response cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry time-to-live in seconds
    pub ttl_secs: u64,
    /// Bound on stored entries; oldest entries are evicted beyond this
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.ttl_secs == 0 {
            return Err(ConfigError::invalid(
                "cache.ttl_secs",
                "must be greater than zero when the cache is enabled",
            ));
        }
        if self.enabled && self.max_entries == 0 {
            return Err(ConfigError::invalid(
                "cache.max_entries",
                "must be greater than zero when the cache is enabled",
            ));
        }
        Ok(())
    }
}

/// Per-organization admission configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Maximum concurrent in-flight requests per organization
    pub max_in_flight_per_org: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_in_flight_per_org: 32,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.max_in_flight_per_org == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.max_in_flight_per_org",
                "must be at least 1 when rate limiting is enabled",
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
        assert!(CacheConfig::default().validate().is_ok());
        assert!(RateLimitConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_ttl_rejected_when_enabled() {
        let config = CacheConfig {
            ttl_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_ttl_allowed_when_disabled() {
        let config = CacheConfig {
            enabled: false,
            ttl_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_in_flight_rejected() {
        let config = RateLimitConfig {
            max_in_flight_per_org: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
