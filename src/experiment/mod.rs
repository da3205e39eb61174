//! A/B test variant assignment and outcome aggregation.
//!
//! Assignment is a pure function of `(test_id, subject_id)`: a SHA-256
//! hash reduced modulo 100 and mapped over the variants' cumulative
//! weights. The same subject always lands in the same variant for a
//! test's lifetime, with no persisted state, and the long-run
//! distribution converges to the configured weights.

use crate::config::ExperimentConfig;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// The arm a subject was assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub test_id: String,
    pub variant_id: String,
    /// Provider the router should prefer for this subject
    pub preferred_provider: Option<String>,
}

/// Outcome of one request attributed to a variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantOutcome {
    pub success: bool,
    pub latency_ms: u64,
    pub cost_usd: f64,
    /// Optional caller-reported satisfaction score (0.0-5.0)
    pub satisfaction: Option<f32>,
}

/// Append-only counters for one (test, variant) pair.
#[derive(Debug, Default)]
struct VariantCounters {
    total_requests: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    total_latency_ms: AtomicU64,
    total_cost_micros: AtomicU64,
    /// Satisfaction stored in thousandths to stay atomic
    satisfaction_sum_milli: AtomicU64,
    satisfaction_count: AtomicU64,
}

/// Serializable aggregate metrics for one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub test_id: String,
    pub variant_id: String,
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_latency_ms: f64,
    pub total_cost_usd: f64,
    pub avg_satisfaction: Option<f64>,
}

impl VariantMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_requests as f64
        }
    }
}

/// Winner determination with a significance-based confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerReport {
    pub test_id: String,
    pub variant_id: String,
    /// One-sided confidence that the leader beats the runner-up (0.5-1.0)
    pub confidence: f64,
    pub leader_success_rate: f64,
    pub runner_up_success_rate: f64,
}

/// Deterministic bucket in 0..100 for a subject within a test.
fn bucket(test_id: &str, subject_id: &str) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(test_id.as_bytes());
    hasher.update(b":");
    hasher.update(subject_id.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(bytes) % 100) as u32
}

/// Assigns subjects to variants and aggregates per-variant outcomes.
pub struct ExperimentManager {
    counters: DashMap<(String, String), VariantCounters>,
}

impl ExperimentManager {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Assign a subject to a variant of the given test.
    ///
    /// Returns None when the test is disabled. Idempotent: the same
    /// subject always maps to the same variant.
    pub fn assign(&self, experiment: &ExperimentConfig, subject_id: &str) -> Option<Variant> {
        if !experiment.enabled || experiment.variants.is_empty() {
            return None;
        }
        let bucket = bucket(&experiment.id, subject_id);
        let mut cumulative = 0u32;
        for variant in &experiment.variants {
            cumulative += variant.weight;
            if bucket < cumulative {
                return Some(Variant {
                    test_id: experiment.id.clone(),
                    variant_id: variant.id.clone(),
                    preferred_provider: variant.preferred_provider.clone(),
                });
            }
        }
        // Weights are validated to sum to 100, so the loop always returns;
        // fall back to the last variant against drifted configs.
        experiment.variants.last().map(|variant| Variant {
            test_id: experiment.id.clone(),
            variant_id: variant.id.clone(),
            preferred_provider: variant.preferred_provider.clone(),
        })
    }

    /// Fold one request outcome into a variant's counters.
    pub fn record_outcome(&self, test_id: &str, variant_id: &str, outcome: VariantOutcome) {
        let counters = self
            .counters
            .entry((test_id.to_string(), variant_id.to_string()))
            .or_default();
        counters.total_requests.fetch_add(1, Ordering::Relaxed);
        if outcome.success {
            counters.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        counters
            .total_latency_ms
            .fetch_add(outcome.latency_ms, Ordering::Relaxed);
        counters.total_cost_micros.fetch_add(
            (outcome.cost_usd.max(0.0) * 1_000_000.0).round() as u64,
            Ordering::Relaxed,
        );
        if let Some(satisfaction) = outcome.satisfaction {
            counters.satisfaction_sum_milli.fetch_add(
                (satisfaction.clamp(0.0, 5.0) * 1000.0).round() as u64,
                Ordering::Relaxed,
            );
            counters.satisfaction_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Aggregated metrics for every variant of a test, sorted by variant id.
    pub fn variant_metrics(&self, test_id: &str) -> Vec<VariantMetrics> {
        let mut metrics: Vec<VariantMetrics> = self
            .counters
            .iter()
            .filter(|entry| entry.key().0 == test_id)
            .map(|entry| {
                let counters = entry.value();
                let total = counters.total_requests.load(Ordering::Relaxed);
                let satisfaction_count = counters.satisfaction_count.load(Ordering::Relaxed);
                VariantMetrics {
                    test_id: entry.key().0.clone(),
                    variant_id: entry.key().1.clone(),
                    total_requests: total,
                    success_count: counters.success_count.load(Ordering::Relaxed),
                    failure_count: counters.failure_count.load(Ordering::Relaxed),
                    avg_latency_ms: if total == 0 {
                        0.0
                    } else {
                        counters.total_latency_ms.load(Ordering::Relaxed) as f64 / total as f64
                    },
                    total_cost_usd: counters.total_cost_micros.load(Ordering::Relaxed) as f64
                        / 1_000_000.0,
                    avg_satisfaction: if satisfaction_count == 0 {
                        None
                    } else {
                        Some(
                            counters.satisfaction_sum_milli.load(Ordering::Relaxed) as f64
                                / 1000.0
                                / satisfaction_count as f64,
                        )
                    },
                }
            })
            .collect();
        metrics.sort_by(|a, b| a.variant_id.cmp(&b.variant_id));
        metrics
    }

    /// Pick the leading variant by success rate with a two-proportion
    /// z-test confidence against the runner-up.
    ///
    /// Returns None until at least two variants have samples.
    pub fn winner(&self, test_id: &str) -> Option<WinnerReport> {
        let mut metrics: Vec<VariantMetrics> = self
            .variant_metrics(test_id)
            .into_iter()
            .filter(|m| m.total_requests > 0)
            .collect();
        if metrics.len() < 2 {
            return None;
        }
        metrics.sort_by(|a, b| {
            b.success_rate()
                .partial_cmp(&a.success_rate())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let leader = &metrics[0];
        let runner_up = &metrics[1];

        let n1 = leader.total_requests as f64;
        let n2 = runner_up.total_requests as f64;
        let p1 = leader.success_rate();
        let p2 = runner_up.success_rate();
        let pooled = (leader.success_count + runner_up.success_count) as f64 / (n1 + n2);
        let variance = pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2);
        let confidence = if variance <= 0.0 {
            // Degenerate pool (all successes or all failures overall)
            if p1 > p2 {
                1.0
            } else {
                0.5
            }
        } else {
            normal_cdf((p1 - p2) / variance.sqrt())
        };

        Some(WinnerReport {
            test_id: test_id.to_string(),
            variant_id: leader.variant_id.clone(),
            confidence,
            leader_success_rate: p1,
            runner_up_success_rate: p2,
        })
    }
}

impl Default for ExperimentManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Standard normal CDF via the Abramowitz-Stegun erf approximation.
fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}
