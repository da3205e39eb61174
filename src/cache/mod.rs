//! Response cache keyed by a normalized request fingerprint.
//!
//! The fingerprint is a SHA-256 over the model, messages, and sampling
//! parameters, so two callers issuing the same normalized request share
//! one entry. Entries expire by TTL and the store is bounded: past
//! capacity the oldest entry is evicted.

use crate::config::CacheConfig;
use crate::types::{RequestPayload, ResponsePayload, TaskDescriptor};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// One cached response.
#[derive(Debug, Clone)]
struct CacheEntry {
    response: ResponsePayload,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) >= self.ttl
    }
}

/// Cache statistics, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded TTL cache over normalized request fingerprints.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Deterministic fingerprint of a normalized request.
///
/// Covers the task type and everything that changes the response: the
/// payload (messages or embedding input, sampling parameters) and quality
/// requirement. Caller identity is deliberately excluded so identical
/// requests share entries; cost attribution happens before the cache.
pub fn fingerprint(task: &TaskDescriptor, payload: &RequestPayload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task.task_type.to_string().as_bytes());
    hasher.update([0xff]);
    hasher.update(task.quality.to_string().as_bytes());
    hasher.update([0xff]);
    match payload {
        RequestPayload::Complete(request) => {
            for message in &request.messages {
                hasher.update(message.role.as_bytes());
                hasher.update([0xfe]);
                hasher.update(message.content.as_bytes());
                hasher.update([0xfe]);
            }
            // Sampling parameters are part of the normalized request
            hasher.update(format!("{:?}", request.temperature).as_bytes());
            hasher.update(format!("{:?}", request.max_tokens).as_bytes());
            hasher.update(format!("{:?}", request.top_p).as_bytes());
            hasher.update(format!("{:?}", request.stop).as_bytes());
        }
        RequestPayload::Embed(request) => {
            for input in &request.input {
                hasher.update(input.as_bytes());
                hasher.update([0xfe]);
            }
        }
    }
    format!("{:x}", hasher.finalize())
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a fingerprint. Expired entries are removed on access.
    pub fn get(&self, fingerprint: &str) -> Option<ResponsePayload> {
        let now = Instant::now();
        let expired = match self.entries.get(fingerprint) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("switchboard_cache_hits_total").increment(1);
                return Some(entry.response.clone());
            }
            None => false,
        };
        if expired {
            self.entries.remove(fingerprint);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("switchboard_cache_misses_total").increment(1);
        None
    }

    /// Store a response under a fingerprint.
    ///
    /// Evicts expired entries first; if still at capacity, the oldest
    /// entry goes.
    pub fn insert(&self, fingerprint: String, response: ResponsePayload, config: &CacheConfig) {
        if !config.enabled {
            return;
        }
        if self.entries.len() >= config.max_entries {
            self.purge_expired();
        }
        while self.entries.len() >= config.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.stored_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
        self.entries.insert(
            fingerprint,
            CacheEntry {
                response,
                stored_at: Instant::now(),
                ttl: Duration::from_secs(config.ttl_secs),
            },
        );
    }

    /// Remove expired entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    /// Drop every entry.
    pub fn purge(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
