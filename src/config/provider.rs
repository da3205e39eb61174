//! Provider and model configuration

use crate::types::QualityRequirement;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// API family a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible API (Bearer auth, /v1/chat/completions)
    OpenAi,
    /// Anthropic Messages API (x-api-key, /v1/messages)
    Anthropic,
    /// Adapter registered programmatically by the host
    Custom,
}

/// One configured provider backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider identifier (e.g., "openai-primary")
    pub id: String,
    pub kind: ProviderKind,
    /// Base URL for API requests (unused for `Custom`)
    #[serde(default)]
    pub base_url: String,
    /// API key; the host may instead inject it at adapter construction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Disabled providers are never offered as candidates
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Admission cap on concurrent in-flight dispatches
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
    /// Seed for the latency EMA before any request completes
    #[serde(default = "default_latency_hint")]
    pub avg_latency_hint_ms: u32,
    /// Models served by this provider
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

fn default_enabled() -> bool {
    true
}

fn default_max_concurrency() -> u32 {
    8
}

fn default_latency_hint() -> u32 {
    500
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid("providers.id", "must not be empty"));
        }
        if self.kind != ProviderKind::Custom && self.base_url.trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("providers.{}.base_url", self.id),
                "must be set for http provider kinds",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::invalid(
                format!("providers.{}.max_concurrency", self.id),
                "must be at least 1",
            ));
        }
        for model in &self.models {
            model.validate(&self.id)?;
        }
        Ok(())
    }
}

/// A model offered by a provider, with capability and pricing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier as the provider knows it (e.g., "gpt-4o-mini")
    pub id: String,
    /// Quality tier this model satisfies
    #[serde(default)]
    pub tier: QualityRequirement,
    /// Maximum context window in tokens
    #[serde(default = "default_context_length")]
    pub context_length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Serves chat/completion tasks (false for embedding-only models)
    #[serde(default = "default_supports_chat")]
    pub supports_chat: bool,
    /// Supports image inputs
    #[serde(default)]
    pub supports_vision: bool,
    /// Supports the embeddings operation
    #[serde(default)]
    pub supports_embeddings: bool,
    /// Cost per million input tokens, USD
    #[serde(default)]
    pub input_cost_per_million: f64,
    /// Cost per million output tokens, USD
    #[serde(default)]
    pub output_cost_per_million: f64,
}

fn default_context_length() -> u32 {
    8192
}

fn default_supports_chat() -> bool {
    true
}

impl ModelConfig {
    fn validate(&self, provider_id: &str) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("providers.{}.models.id", provider_id),
                "must not be empty",
            ));
        }
        if self.context_length == 0 {
            return Err(ConfigError::invalid(
                format!("providers.{}.models.{}.context_length", provider_id, self.id),
                "must be greater than zero",
            ));
        }
        if self.input_cost_per_million < 0.0 || self.output_cost_per_million < 0.0 {
            return Err(ConfigError::invalid(
                format!("providers.{}.models.{}", provider_id, self.id),
                "token costs must be non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_provider() -> ProviderConfig {
        ProviderConfig {
            id: "openai-primary".to_string(),
            kind: ProviderKind::OpenAi,
            base_url: "https://api.openai.com".to_string(),
            api_key: Some("sk-test".to_string()),
            enabled: true,
            max_concurrency: 8,
            avg_latency_hint_ms: 500,
            models: vec![ModelConfig {
                id: "gpt-4o-mini".to_string(),
                tier: QualityRequirement::Standard,
                context_length: 128_000,
                max_output_tokens: Some(16_384),
                supports_chat: true,
                supports_vision: true,
                supports_embeddings: false,
                input_cost_per_million: 0.15,
                output_cost_per_million: 0.60,
            }],
        }
    }

    #[test]
    fn valid_provider_passes() {
        assert!(valid_provider().validate().is_ok());
    }

    #[test]
    fn empty_id_rejected() {
        let provider = ProviderConfig {
            id: "".to_string(),
            ..valid_provider()
        };
        assert!(provider.validate().is_err());
    }

    #[test]
    fn missing_base_url_rejected_for_http_kinds() {
        let provider = ProviderConfig {
            base_url: "".to_string(),
            ..valid_provider()
        };
        assert!(provider.validate().is_err());
    }

    #[test]
    fn custom_kind_allows_missing_base_url() {
        let provider = ProviderConfig {
            kind: ProviderKind::Custom,
            base_url: "".to_string(),
            ..valid_provider()
        };
        assert!(provider.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let provider = ProviderConfig {
            max_concurrency: 0,
            ..valid_provider()
        };
        assert!(provider.validate().is_err());
    }

    #[test]
    fn negative_pricing_rejected() {
        let mut provider = valid_provider();
        provider.models[0].input_cost_per_million = -1.0;
        let err = provider.validate().unwrap_err();
        assert!(err.to_string().contains("gpt-4o-mini"));
    }

    #[test]
    fn provider_config_toml_round_trip() {
        let provider = valid_provider();
        let toml = toml::to_string(&provider).unwrap();
        let back: ProviderConfig = toml::from_str(&toml).unwrap();
        assert_eq!(provider, back);
    }
}
