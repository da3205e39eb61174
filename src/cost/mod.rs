//! Budget tracking and enforcement.
//!
//! The guard approves requests optimistically against per-organization
//! rolling windows and commits the true cost only after a response was
//! observed. Because token counts are only known post-response, a burst of
//! concurrent requests can transiently overshoot a window limit by at most
//! the sum of in-flight estimates; in-flight dispatches are bounded by the
//! per-provider admission semaphores, so the overshoot is bounded by
//! `sum(max_concurrency) * per_request_limit`.

use crate::config::{CostConfig, CostEnforcement};
use crate::types::Complexity;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of a budget check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Approved,
    Rejected { reason: String },
}

impl Authorization {
    pub fn approved(&self) -> bool {
        matches!(self, Authorization::Approved)
    }
}

/// Spend accounting for one organization in one rolling window.
///
/// Spend is stored in micro-dollars to keep sub-cent token prices exact
/// under atomic addition.
#[derive(Debug)]
struct LedgerEntry {
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    spent_micros: AtomicU64,
    request_count: AtomicU64,
}

/// Serializable view of one ledger window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerView {
    pub organization_id: String,
    pub window: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub spent_usd: f64,
    pub request_count: u64,
}

/// Per-organization budget guard with rolling daily and monthly windows.
///
/// Ledger entries are created lazily per organization per window,
/// incremented atomically on commit, and never decremented.
pub struct CostGuard {
    ledgers: DashMap<String, LedgerEntry>,
}

/// Estimate input tokens from request text length.
///
/// Heuristic: 1 token per 4 characters, with a 1.15x conservative
/// multiplier for unknown tokenizers.
pub fn estimate_input_tokens(content_chars: usize) -> u32 {
    let base_tokens = (content_chars / 4) as u32;
    ((base_tokens as f64) * 1.15) as u32
}

/// Estimate output tokens from input tokens, scaled by the caller's
/// complexity signal and clamped by max_tokens when set.
///
/// Baseline heuristic is output = input * 0.5; low-complexity tasks
/// (classification, extraction) answer shorter, high-complexity tasks
/// (generation, reasoning) answer at input length.
pub fn estimate_output_tokens(
    input_tokens: u32,
    complexity: Complexity,
    max_tokens: Option<u32>,
) -> u32 {
    let ratio = match complexity {
        Complexity::Low => 0.25,
        Complexity::Medium => 0.5,
        Complexity::High => 1.0,
    };
    let estimate = (input_tokens as f64 * ratio) as u32;
    match max_tokens {
        Some(cap) => estimate.min(cap),
        None => estimate,
    }
}

impl CostGuard {
    pub fn new() -> Self {
        Self {
            ledgers: DashMap::new(),
        }
    }

    /// Check whether a request with the given estimated cost may proceed.
    ///
    /// Approves optimistically; nothing is reserved. In observe mode a
    /// would-have-been-blocked decision is logged and approved.
    pub fn authorize(
        &self,
        organization_id: &str,
        estimated_cost: f64,
        config: &CostConfig,
    ) -> Authorization {
        if !config.enabled {
            return Authorization::Approved;
        }

        let violation = self.find_violation(organization_id, estimated_cost, config);
        match violation {
            None => Authorization::Approved,
            Some(reason) => match config.enforcement {
                CostEnforcement::Enforce => {
                    metrics::counter!("switchboard_cost_rejections_total").increment(1);
                    Authorization::Rejected { reason }
                }
                CostEnforcement::Observe => {
                    tracing::warn!(
                        organization = organization_id,
                        estimated_cost,
                        %reason,
                        "cost limit would block request (observe mode)"
                    );
                    metrics::counter!("switchboard_cost_observe_bypasses_total").increment(1);
                    Authorization::Approved
                }
            },
        }
    }

    fn find_violation(
        &self,
        organization_id: &str,
        estimated_cost: f64,
        config: &CostConfig,
    ) -> Option<String> {
        if estimated_cost > config.per_request_limit {
            return Some(format!(
                "Estimated cost ${:.4} exceeds per-request limit ${:.4}",
                estimated_cost, config.per_request_limit
            ));
        }

        let now = Utc::now();
        let daily = self.spend_for_key(&daily_key(organization_id, now));
        if estimated_cost + daily > config.daily_limit {
            return Some(format!(
                "Request cost ${:.4} would exceed daily budget (${:.4}/${:.4})",
                estimated_cost,
                daily + estimated_cost,
                config.daily_limit
            ));
        }

        let monthly = self.spend_for_key(&monthly_key(organization_id, now));
        if estimated_cost + monthly > config.monthly_limit {
            return Some(format!(
                "Request cost ${:.4} would exceed monthly budget (${:.4}/${:.4})",
                estimated_cost,
                monthly + estimated_cost,
                config.monthly_limit
            ));
        }

        None
    }

    /// Record the true cost of a successfully dispatched request.
    ///
    /// Called only after a response was observed; spend within a window is
    /// monotonically increasing.
    pub fn commit(&self, organization_id: &str, actual_cost: f64) {
        let micros = to_micros(actual_cost);
        let now = Utc::now();

        for (key, bounds) in [
            (daily_key(organization_id, now), daily_bounds(now)),
            (monthly_key(organization_id, now), monthly_bounds(now)),
        ] {
            let entry = self.ledgers.entry(key).or_insert_with(|| LedgerEntry {
                window_start: bounds.0,
                window_end: bounds.1,
                spent_micros: AtomicU64::new(0),
                request_count: AtomicU64::new(0),
            });
            entry.spent_micros.fetch_add(micros, Ordering::Relaxed);
            entry.request_count.fetch_add(1, Ordering::Relaxed);
        }

        metrics::counter!("switchboard_cost_committed_micros_total").increment(micros);
        tracing::debug!(
            organization = organization_id,
            cost_usd = actual_cost,
            "cost committed"
        );
    }

    /// Current spend in USD for one window key; 0 when no ledger exists.
    fn spend_for_key(&self, key: &str) -> f64 {
        self.ledgers
            .get(key)
            .map(|entry| from_micros(entry.spent_micros.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    /// Spend in the current daily window for an organization, USD.
    pub fn daily_spend(&self, organization_id: &str) -> f64 {
        self.spend_for_key(&daily_key(organization_id, Utc::now()))
    }

    /// Spend in the current monthly window for an organization, USD.
    pub fn monthly_spend(&self, organization_id: &str) -> f64 {
        self.spend_for_key(&monthly_key(organization_id, Utc::now()))
    }

    /// Drop ledgers whose window has ended.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.ledgers.retain(|_, entry| entry.window_end > now);
    }

    /// Snapshot of all live ledgers, for observability.
    pub fn ledger_views(&self) -> Vec<LedgerView> {
        let mut views: Vec<LedgerView> = self
            .ledgers
            .iter()
            .map(|entry| {
                let (organization_id, window) = split_key(entry.key());
                LedgerView {
                    organization_id,
                    window,
                    window_start: entry.window_start,
                    window_end: entry.window_end,
                    spent_usd: from_micros(entry.spent_micros.load(Ordering::Relaxed)),
                    request_count: entry.request_count.load(Ordering::Relaxed),
                }
            })
            .collect();
        views.sort_by(|a, b| {
            a.organization_id
                .cmp(&b.organization_id)
                .then(a.window.cmp(&b.window))
        });
        views
    }
}

impl Default for CostGuard {
    fn default() -> Self {
        Self::new()
    }
}

fn to_micros(cost_usd: f64) -> u64 {
    (cost_usd.max(0.0) * 1_000_000.0).round() as u64
}

fn from_micros(micros: u64) -> f64 {
    micros as f64 / 1_000_000.0
}

fn daily_key(organization_id: &str, now: DateTime<Utc>) -> String {
    format!("{}|d|{}", organization_id, now.format("%Y-%m-%d"))
}

fn monthly_key(organization_id: &str, now: DateTime<Utc>) -> String {
    format!("{}|m|{}", organization_id, now.format("%Y-%m"))
}

fn split_key(key: &str) -> (String, String) {
    let mut parts = key.splitn(3, '|');
    let organization = parts.next().unwrap_or_default().to_string();
    let kind = parts.next().unwrap_or_default();
    let stamp = parts.next().unwrap_or_default();
    (organization, format!("{}:{}", kind, stamp))
}

/// Midnight-to-midnight UTC bounds for the daily window at `now`.
fn daily_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now);
    (start, start + chrono::Duration::days(1))
}

/// Calendar-month UTC bounds for the monthly window at `now`.
fn monthly_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(start + chrono::Duration::days(31));
    (start, end)
}
