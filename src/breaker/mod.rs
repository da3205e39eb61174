//! Per-provider circuit breaker.
//!
//! Tracks dispatch outcomes per provider and refuses traffic to providers
//! that keep failing. State transitions:
//!
//! - `Closed -> Open` when `consecutive_failures >= failure_threshold`
//!   within the rolling monitoring window
//! - `Open -> HalfOpen` once the recovery timeout has elapsed; the timeout
//!   doubles for each consecutive open, capped at a maximum
//! - `HalfOpen` admits exactly one trial call; success closes the circuit
//!   and resets the failure counter, failure re-opens it and resets the
//!   clock. Concurrent callers during the trial are refused and must fall
//!   back to the next candidate.

use crate::config::BreakerConfig;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Circuit state for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    /// Provider is believed healthy; calls flow through
    #[default]
    Closed,
    /// Provider is failing; calls are refused until the next probe time
    Open,
    /// One probe call is allowed through to test recovery
    HalfOpen,
}

#[derive(Debug)]
struct ProviderCircuit {
    state: CircuitState,
    consecutive_failures: u32,
    /// Consecutive opens, drives the exponential recovery timeout
    open_count: u32,
    last_failure_at: Option<Instant>,
    next_probe_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Default for ProviderCircuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            open_count: 0,
            last_failure_at: None,
            next_probe_at: None,
            trial_in_flight: false,
        }
    }
}

/// Serializable point-in-time view of one provider's circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub provider_id: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Milliseconds until the next probe is admitted, if open
    pub next_probe_in_ms: Option<u64>,
}

/// Failure-isolation state machine shared across calls.
///
/// All transitions happen under the per-entry map guard, so concurrent
/// `allow` calls during `HalfOpen` admit exactly one trial.
pub struct CircuitBreaker {
    circuits: DashMap<String, ProviderCircuit>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            circuits: DashMap::new(),
        }
    }

    /// Whether a dispatch to this provider is currently allowed.
    ///
    /// May transition `Open -> HalfOpen` as a side effect; a `true` return
    /// in `HalfOpen` claims the single trial slot.
    pub fn allow(&self, provider_id: &str) -> bool {
        let mut circuit = self.circuits.entry(provider_id.to_string()).or_default();
        match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let due = circuit
                    .next_probe_at
                    .map(|at| Instant::now() >= at)
                    .unwrap_or(true);
                if due {
                    circuit.state = CircuitState::HalfOpen;
                    circuit.trial_in_flight = true;
                    tracing::debug!(provider = provider_id, "circuit half-open, probing");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if circuit.trial_in_flight {
                    false
                } else {
                    circuit.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Return an unused HalfOpen trial slot.
    ///
    /// Called when a caller that claimed the probe via `allow` is skipped
    /// for a non-circuit reason (budget, saturation) before dispatching,
    /// so the probe slot is not leaked.
    pub fn release_trial(&self, provider_id: &str) {
        if let Some(mut circuit) = self.circuits.get_mut(provider_id) {
            if circuit.state == CircuitState::HalfOpen {
                circuit.trial_in_flight = false;
            }
        }
    }

    /// Record a successful dispatch.
    pub fn record_success(&self, provider_id: &str) {
        let mut circuit = self.circuits.entry(provider_id.to_string()).or_default();
        match circuit.state {
            CircuitState::HalfOpen => {
                tracing::info!(provider = provider_id, "circuit closed after probe success");
                *circuit = ProviderCircuit::default();
            }
            _ => {
                circuit.consecutive_failures = 0;
                circuit.open_count = 0;
            }
        }
    }

    /// Record a failed dispatch.
    pub fn record_failure(&self, provider_id: &str, config: &BreakerConfig) {
        let now = Instant::now();
        let mut circuit = self.circuits.entry(provider_id.to_string()).or_default();
        match circuit.state {
            CircuitState::HalfOpen => {
                circuit.open_count += 1;
                circuit.trial_in_flight = false;
                circuit.last_failure_at = Some(now);
                circuit.next_probe_at = Some(now + recovery_timeout(circuit.open_count, config));
                circuit.state = CircuitState::Open;
                tracing::warn!(provider = provider_id, "circuit re-opened after failed probe");
            }
            CircuitState::Closed => {
                let window = Duration::from_millis(config.monitoring_window_ms);
                let stale = circuit
                    .last_failure_at
                    .map(|at| now.duration_since(at) > window)
                    .unwrap_or(false);
                circuit.consecutive_failures = if stale {
                    1
                } else {
                    circuit.consecutive_failures + 1
                };
                circuit.last_failure_at = Some(now);
                if circuit.consecutive_failures >= config.failure_threshold {
                    circuit.open_count += 1;
                    circuit.next_probe_at =
                        Some(now + recovery_timeout(circuit.open_count, config));
                    circuit.state = CircuitState::Open;
                    tracing::warn!(
                        provider = provider_id,
                        failures = circuit.consecutive_failures,
                        "circuit opened"
                    );
                }
            }
            CircuitState::Open => {
                circuit.consecutive_failures += 1;
                circuit.last_failure_at = Some(now);
            }
        }
    }

    /// Current state of one provider's circuit.
    pub fn state(&self, provider_id: &str) -> CircuitState {
        self.circuits
            .get(provider_id)
            .map(|c| c.state)
            .unwrap_or_default()
    }

    /// Snapshot of every tracked circuit, sorted by provider id.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let now = Instant::now();
        let mut snapshots: Vec<CircuitSnapshot> = self
            .circuits
            .iter()
            .map(|entry| CircuitSnapshot {
                provider_id: entry.key().clone(),
                state: entry.state,
                consecutive_failures: entry.consecutive_failures,
                next_probe_in_ms: entry.next_probe_at.and_then(|at| {
                    at.checked_duration_since(now).map(|d| d.as_millis() as u64)
                }),
            })
            .collect();
        snapshots.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        snapshots
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// Recovery timeout for the nth consecutive open: base * 2^(n-1), capped.
fn recovery_timeout(open_count: u32, config: &BreakerConfig) -> Duration {
    let exponent = open_count.saturating_sub(1).min(16);
    let grown = config
        .recovery_timeout_ms
        .saturating_mul(1u64 << exponent)
        .min(config.max_recovery_timeout_ms);
    Duration::from_millis(grown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            monitoring_window_ms: 60_000,
            recovery_timeout_ms: 80,
            max_recovery_timeout_ms: 320,
        }
    }

    #[test]
    fn closed_allows_by_default() {
        let breaker = CircuitBreaker::new();
        assert!(breaker.allow("p1"));
        assert_eq!(breaker.state("p1"), CircuitState::Closed);
    }

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new();
        let config = fast_config();
        for _ in 0..3 {
            breaker.record_failure("p1", &config);
        }
        assert_eq!(breaker.state("p1"), CircuitState::Open);
        assert!(!breaker.allow("p1"));
    }

    #[test]
    fn below_threshold_stays_closed() {
        let breaker = CircuitBreaker::new();
        let config = fast_config();
        breaker.record_failure("p1", &config);
        breaker.record_failure("p1", &config);
        assert_eq!(breaker.state("p1"), CircuitState::Closed);
        assert!(breaker.allow("p1"));
    }

    #[test]
    fn success_resets_failure_counter() {
        let breaker = CircuitBreaker::new();
        let config = fast_config();
        breaker.record_failure("p1", &config);
        breaker.record_failure("p1", &config);
        breaker.record_success("p1");
        breaker.record_failure("p1", &config);
        breaker.record_failure("p1", &config);
        assert_eq!(breaker.state("p1"), CircuitState::Closed);
    }

    #[test]
    fn half_open_admits_exactly_one_trial() {
        let breaker = CircuitBreaker::new();
        let config = fast_config();
        for _ in 0..3 {
            breaker.record_failure("p1", &config);
        }
        std::thread::sleep(Duration::from_millis(100));

        assert!(breaker.allow("p1"));
        assert_eq!(breaker.state("p1"), CircuitState::HalfOpen);
        // Concurrent caller during the trial is refused
        assert!(!breaker.allow("p1"));
    }

    #[test]
    fn probe_success_closes_circuit() {
        let breaker = CircuitBreaker::new();
        let config = fast_config();
        for _ in 0..3 {
            breaker.record_failure("p1", &config);
        }
        std::thread::sleep(Duration::from_millis(100));
        assert!(breaker.allow("p1"));
        breaker.record_success("p1");
        assert_eq!(breaker.state("p1"), CircuitState::Closed);
        let snapshot = &breaker.snapshots()[0];
        assert_eq!(snapshot.consecutive_failures, 0);
    }

    #[test]
    fn probe_failure_reopens_with_longer_timeout() {
        let breaker = CircuitBreaker::new();
        let config = fast_config();
        for _ in 0..3 {
            breaker.record_failure("p1", &config);
        }
        std::thread::sleep(Duration::from_millis(100));
        assert!(breaker.allow("p1"));
        breaker.record_failure("p1", &config);
        assert_eq!(breaker.state("p1"), CircuitState::Open);

        // Second open doubles the timeout: 80ms base -> 160ms. Not yet due.
        std::thread::sleep(Duration::from_millis(60));
        assert!(!breaker.allow("p1"));
        std::thread::sleep(Duration::from_millis(150));
        assert!(breaker.allow("p1"));
    }

    #[test]
    fn recovery_timeout_is_capped() {
        let config = fast_config();
        assert_eq!(recovery_timeout(1, &config), Duration::from_millis(80));
        assert_eq!(recovery_timeout(2, &config), Duration::from_millis(160));
        assert_eq!(recovery_timeout(3, &config), Duration::from_millis(320));
        assert_eq!(recovery_timeout(10, &config), Duration::from_millis(320));
    }

    #[test]
    fn failures_outside_window_do_not_accumulate() {
        let breaker = CircuitBreaker::new();
        let config = BreakerConfig {
            monitoring_window_ms: 20,
            ..fast_config()
        };
        breaker.record_failure("p1", &config);
        breaker.record_failure("p1", &config);
        std::thread::sleep(Duration::from_millis(30));
        // Window elapsed; this failure starts a fresh streak of 1
        breaker.record_failure("p1", &config);
        assert_eq!(breaker.state("p1"), CircuitState::Closed);
    }

    #[test]
    fn providers_are_isolated() {
        let breaker = CircuitBreaker::new();
        let config = fast_config();
        for _ in 0..3 {
            breaker.record_failure("p1", &config);
        }
        assert!(!breaker.allow("p1"));
        assert!(breaker.allow("p2"));
    }
}
