//! Cache Metrics Collection
//!
//! Hit/miss/set/remove accounting for the tiered cache, in total and per key.
//!
//! # Design
//!
//! - Totals are plain atomics; no lock is taken on the hot path
//! - Per-key counters live in a DashMap and are created on first touch
//! - A key's size is the last size written for it, so the running total is
//!   adjusted by the delta on overwrite and by the full size on removal

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use super::engine::CacheTier;
use super::TOP_KEYS_LIMIT;

#[derive(Debug, Default)]
struct KeyCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    size_bytes: AtomicU64,
}

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    keys: DashMap<String, KeyCounters>,

    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    removes: AtomicU64,
    total_size_bytes: AtomicI64,

    // Tier split of hits
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,

    // Microseconds, exponential moving average
    l2_read_latency_us: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    fn with_key<F: FnOnce(&KeyCounters)>(&self, key: &str, f: F) {
        if let Some(counters) = self.keys.get(key) {
            f(counters.value());
            return;
        }
        f(self.keys.entry(key.to_string()).or_default().value());
    }

    pub fn record_hit(&self, key: &str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.with_key(key, |c| {
            c.hits.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Record which tier served a hit
    pub fn record_tier_hit(&self, tier: CacheTier) {
        match tier {
            CacheTier::L1 => self.l1_hits.fetch_add(1, Ordering::Relaxed),
            CacheTier::L2 => self.l2_hits.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_miss(&self, key: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.with_key(key, |c| {
            c.misses.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Record a write of `size_bytes` stored bytes
    pub fn record_set(&self, key: &str, size_bytes: u64) {
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.with_key(key, |c| {
            c.sets.fetch_add(1, Ordering::Relaxed);
            let previous = c.size_bytes.swap(size_bytes, Ordering::Relaxed);
            self.total_size_bytes
                .fetch_add(size_bytes as i64 - previous as i64, Ordering::Relaxed);
        });
    }

    /// Record a removal; the key's counters are discarded
    pub fn record_remove(&self, key: &str) {
        self.removes.fetch_add(1, Ordering::Relaxed);
        if let Some((_, counters)) = self.keys.remove(key) {
            let size = counters.size_bytes.load(Ordering::Relaxed);
            self.total_size_bytes
                .fetch_sub(size as i64, Ordering::Relaxed);
        }
    }

    pub fn record_l2_read_latency(&self, duration: Duration) {
        update_latency_ema(&self.l2_read_latency_us, duration);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit rate as a percentage, 0 when nothing was requested
    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.hits(), self.misses())
    }

    pub fn l2_read_latency(&self) -> Duration {
        Duration::from_micros(self.l2_read_latency_us.load(Ordering::Relaxed))
    }

    /// Take a point-in-time snapshot
    pub fn snapshot(&self) -> CacheStatistics {
        let total_hits = self.hits();
        let total_misses = self.misses();

        let mut top_keys: Vec<KeyStatistics> = self
            .keys
            .iter()
            .map(|entry| {
                let c = entry.value();
                let hits = c.hits.load(Ordering::Relaxed);
                let misses = c.misses.load(Ordering::Relaxed);
                KeyStatistics {
                    key: entry.key().clone(),
                    hits,
                    misses,
                    sets: c.sets.load(Ordering::Relaxed),
                    size_bytes: c.size_bytes.load(Ordering::Relaxed),
                    hit_rate: hit_rate(hits, misses),
                }
            })
            .collect();
        top_keys.sort_by(|a, b| {
            (b.hits + b.misses)
                .cmp(&(a.hits + a.misses))
                .then_with(|| a.key.cmp(&b.key))
        });
        let key_count = top_keys.len();
        top_keys.truncate(TOP_KEYS_LIMIT);

        CacheStatistics {
            total_hits,
            total_misses,
            total_sets: self.sets.load(Ordering::Relaxed),
            total_removes: self.removes.load(Ordering::Relaxed),
            total_requests: total_hits + total_misses,
            hit_rate: hit_rate(total_hits, total_misses),
            total_size_bytes: self.total_size_bytes.load(Ordering::Relaxed),
            key_count,
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            l2_read_latency_us: self.l2_read_latency_us.load(Ordering::Relaxed),
            top_keys,
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.keys.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.removes.store(0, Ordering::Relaxed);
        self.total_size_bytes.store(0, Ordering::Relaxed);
        self.l1_hits.store(0, Ordering::Relaxed);
        self.l2_hits.store(0, Ordering::Relaxed);
        self.l2_read_latency_us.store(0, Ordering::Relaxed);
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 * 100.0 / total as f64
    }
}

fn update_latency_ema(target: &AtomicU64, duration: Duration) {
    let new_us = duration.as_micros() as u64;
    let alpha = 0.1; // EMA smoothing factor

    loop {
        let current = target.load(Ordering::Relaxed);
        let updated = if current == 0 {
            new_us
        } else {
            ((1.0 - alpha) * current as f64 + alpha * new_us as f64) as u64
        };

        if target
            .compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            break;
        }
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStatistics {
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_sets: u64,
    pub total_removes: u64,
    pub total_requests: u64,
    /// Percentage in `[0, 100]`
    pub hit_rate: f64,
    pub total_size_bytes: i64,
    pub key_count: usize,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub l2_read_latency_us: u64,
    /// Busiest keys by hits + misses
    pub top_keys: Vec<KeyStatistics>,
}

/// Per-key statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyStatistics {
    pub key: String,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub size_bytes: u64,
    /// Percentage in `[0, 100]`
    pub hit_rate: f64,
}

/// Latency tracker helper
pub struct LatencyTracker {
    start: Instant,
}

impl LatencyTracker {
    /// Start tracking latency
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

// =============================================================================
// Tests
// =============================================================================
