//! # Metrics Collection Module
//!
//! Provides request metrics emission through the `metrics` facade and a
//! typed health snapshot for observability collaborators.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `switchboard_requests_total{task_type}` - Total requests
//! - `switchboard_request_failures_total{task_type}` - Failed requests
//! - `switchboard_fallbacks_total{provider}` - Calls served by a fallback
//! - `switchboard_cache_hits_total` / `switchboard_cache_misses_total`
//! - `switchboard_cost_rejections_total` - Budget rejections
//! - `switchboard_tokens_total{provider, type}` - Token counts
//!
//! **Histograms:**
//! - `switchboard_request_duration_ms{provider}` - Request duration
//!
//! **Gauges:**
//! - `switchboard_providers_total` / `switchboard_circuits_open`
//!
//! The host application installs a recorder (e.g. the re-exported
//! [`PrometheusBuilder`]); without one, emission is a no-op.

// Re-export for hosts that want a Prometheus endpoint
pub use metrics_exporter_prometheus::PrometheusBuilder;

use crate::breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
use crate::cache::{CacheStats, ResponseCache};
use crate::cost::{CostGuard, LedgerView};
use crate::registry::{ModelRegistry, ProviderView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Point-in-time health snapshot across every subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub uptime_secs: u64,
    pub providers: Vec<ProviderView>,
    pub circuits: Vec<CircuitSnapshot>,
    pub cache: CacheStats,
    pub ledgers: Vec<LedgerView>,
}

/// Central coordinator for metrics collection and gauge computation.
pub struct MetricsCollector {
    registry: Arc<ModelRegistry>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<ResponseCache>,
    guard: Arc<CostGuard>,
    /// Service startup time for uptime calculation
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new(
        registry: Arc<ModelRegistry>,
        breaker: Arc<CircuitBreaker>,
        cache: Arc<ResponseCache>,
        guard: Arc<CostGuard>,
    ) -> Self {
        Self {
            registry,
            breaker,
            cache,
            guard,
            start_time: Instant::now(),
        }
    }

    /// Build the health snapshot and refresh derived gauges.
    pub fn snapshot(&self) -> HealthMetrics {
        let providers = self.registry.provider_views();
        let circuits = self.breaker.snapshots();

        metrics::gauge!("switchboard_providers_total").set(providers.len() as f64);
        let open = circuits
            .iter()
            .filter(|c| c.state == CircuitState::Open)
            .count();
        metrics::gauge!("switchboard_circuits_open").set(open as f64);
        for provider in &providers {
            metrics::gauge!(
                "switchboard_pending_requests",
                "provider" => provider.id.clone()
            )
            .set(provider.pending_requests as f64);
        }

        HealthMetrics {
            uptime_secs: self.start_time.elapsed().as_secs(),
            providers,
            circuits,
            cache: self.cache.stats(),
            ledgers: self.guard.ledger_views(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_subsystems() {
        let registry = Arc::new(ModelRegistry::new());
        let breaker = Arc::new(CircuitBreaker::new());
        let cache = Arc::new(ResponseCache::new());
        let guard = Arc::new(CostGuard::new());
        let collector = MetricsCollector::new(
            Arc::clone(&registry),
            Arc::clone(&breaker),
            Arc::clone(&cache),
            Arc::clone(&guard),
        );

        guard.commit("org-1", 0.5);
        let snapshot = collector.snapshot();
        assert!(snapshot.providers.is_empty());
        assert_eq!(snapshot.ledgers.len(), 2);
        assert_eq!(snapshot.cache.entries, 0);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let collector = MetricsCollector::new(
            Arc::new(ModelRegistry::new()),
            Arc::new(CircuitBreaker::new()),
            Arc::new(ResponseCache::new()),
            Arc::new(CostGuard::new()),
        );
        let json = serde_json::to_string(&collector.snapshot()).unwrap();
        assert!(json.contains("uptime_secs"));
    }
}
