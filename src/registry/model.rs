//! Provider and model catalogue entries.

use crate::config::ModelConfig;
use crate::types::QualityRequirement;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Pricing per million tokens for one model.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

impl ModelPricing {
    /// Cost in USD for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (self.input_cost_per_million * input_tokens as f64 / 1_000_000.0)
            + (self.output_cost_per_million * output_tokens as f64 / 1_000_000.0)
    }
}

/// One (provider, model) pair with capability and pricing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub provider_id: String,
    pub model_id: String,
    pub tier: QualityRequirement,
    pub context_length: u32,
    pub max_output_tokens: Option<u32>,
    pub supports_chat: bool,
    pub supports_vision: bool,
    pub supports_embeddings: bool,
    pub pricing: ModelPricing,
}

impl ModelEntry {
    pub fn from_config(provider_id: &str, config: &ModelConfig) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            model_id: config.id.clone(),
            tier: config.tier,
            context_length: config.context_length,
            max_output_tokens: config.max_output_tokens,
            supports_chat: config.supports_chat,
            supports_vision: config.supports_vision,
            supports_embeddings: config.supports_embeddings,
            pricing: ModelPricing {
                input_cost_per_million: config.input_cost_per_million,
                output_cost_per_million: config.output_cost_per_million,
            },
        }
    }
}

/// Runtime state of a registered provider.
///
/// Contains both configuration and runtime counters (atomics for
/// thread-safe updates, following the same snapshot-view discipline as
/// serialization: atomics are read into a [`ProviderView`]).
#[derive(Debug)]
pub struct ProviderDescriptor {
    /// Unique provider identifier
    pub id: String,
    /// Disabled providers are skipped during candidate selection
    pub enabled: bool,
    /// Admission cap on concurrent dispatches
    pub max_concurrency: u32,
    /// Current in-flight requests (atomic)
    pub pending_requests: AtomicU32,
    /// Lifetime total requests served (atomic)
    pub total_requests: AtomicU64,
    /// Rolling average latency in milliseconds (atomic, EMA with alpha=0.2)
    pub avg_latency_ms: AtomicU32,
}

impl ProviderDescriptor {
    pub fn new(id: String, enabled: bool, max_concurrency: u32, latency_hint_ms: u32) -> Self {
        Self {
            id,
            enabled,
            max_concurrency,
            pending_requests: AtomicU32::new(0),
            total_requests: AtomicU64::new(0),
            avg_latency_ms: AtomicU32::new(latency_hint_ms),
        }
    }

    /// Fold a completed request's latency into the rolling average.
    pub fn record_latency(&self, latency_ms: u64) {
        let sample = latency_ms.min(u32::MAX as u64) as u32;
        let old = self.avg_latency_ms.load(Ordering::Relaxed);
        let new = if old == 0 {
            sample
        } else {
            // EMA with alpha = 0.2
            (old as u64 * 8 / 10 + sample as u64 * 2 / 10) as u32
        };
        self.avg_latency_ms.store(new, Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }
}

/// Serializable view of a provider (atomic fields read into plain values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderView {
    pub id: String,
    pub enabled: bool,
    pub max_concurrency: u32,
    pub pending_requests: u32,
    pub total_requests: u64,
    pub avg_latency_ms: u32,
    pub model_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_cost_per_million() {
        let pricing = ModelPricing {
            input_cost_per_million: 3.0,
            output_cost_per_million: 15.0,
        };
        let cost = pricing.cost(1_000_000, 1_000_000);
        assert!((cost - 18.0).abs() < 1e-9);
    }

    #[test]
    fn pricing_cost_small_counts() {
        let pricing = ModelPricing {
            input_cost_per_million: 1.0,
            output_cost_per_million: 2.0,
        };
        let cost = pricing.cost(500, 250);
        assert!((cost - 0.001).abs() < 1e-9);
    }

    #[test]
    fn latency_ema_converges_toward_samples() {
        let descriptor = ProviderDescriptor::new("p1".to_string(), true, 4, 0);
        descriptor.record_latency(100);
        assert_eq!(descriptor.avg_latency_ms.load(Ordering::Relaxed), 100);
        descriptor.record_latency(200);
        let avg = descriptor.avg_latency_ms.load(Ordering::Relaxed);
        assert!(avg > 100 && avg < 200);
        assert_eq!(descriptor.total_requests.load(Ordering::Relaxed), 2);
    }
}
