//! L1 Cache - In-Process Hot Tier
//!
//! Holds deserialized values keyed by full cache key. Reads never touch the
//! codec, so a hit costs one shard read lock and a downcast.
//!
//! # Design
//!
//! - Entries live in a [`ShardedMap`] weighted by the packed size of the value
//! - Expiration is checked lazily on access, plus an opportunistic sweep run
//!   by whichever reader first notices the scan interval has passed
//! - Going over the size limit compacts: expired entries first, then least
//!   recently accessed until `size_limit * (1 - compaction_percentage)`

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::entry::{Expiration, LocalEntry, LocalValue};
use super::shard::ShardedMap;
use super::L1_SHARD_COUNT;
use crate::config::MemoryOptions;

/// Contract for the in-process tier
pub trait LocalStore: Send + Sync {
    /// Look up a live value
    fn try_get(&self, key: &str) -> Option<LocalValue>;

    /// Store a value with its expiration and a size hint for eviction accounting
    fn set(&self, key: String, value: LocalValue, expiration: &Expiration, size_hint: u64);

    /// Remove a value, returning whether it was present
    fn remove(&self, key: &str) -> bool;

    /// Presence check that does not count as an access
    fn contains(&self, key: &str) -> bool;

    /// Live keys matching a glob pattern
    fn keys_matching(&self, pattern: &str) -> Vec<String>;

    /// Drop every entry
    fn clear(&self);
}

/// L1 Cache configuration
#[derive(Debug, Clone)]
pub struct L1Config {
    /// Maximum total size hint in bytes
    pub size_limit: u64,
    /// Fraction of the size limit freed by a compaction
    pub compaction_percentage: f64,
    /// Minimum interval between expiration scans
    pub expiration_scan_frequency: Duration,
}

impl Default for L1Config {
    fn default() -> Self {
        Self::from(&MemoryOptions::default())
    }
}

impl From<&MemoryOptions> for L1Config {
    fn from(options: &MemoryOptions) -> Self {
        Self {
            size_limit: options.size_limit,
            compaction_percentage: options.compaction_percentage,
            expiration_scan_frequency: options.expiration_scan_frequency(),
        }
    }
}

/// L1 Cache - in-process hot tier
pub struct L1Cache {
    storage: ShardedMap<LocalEntry, L1_SHARD_COUNT>,
    config: L1Config,
    last_scan: Mutex<Instant>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl L1Cache {
    /// Create a new L1 cache with default configuration
    pub fn new() -> Self {
        Self::with_config(L1Config::default())
    }

    /// Create a new L1 cache with custom configuration
    pub fn with_config(config: L1Config) -> Self {
        Self {
            storage: ShardedMap::new(),
            config,
            last_scan: Mutex::new(Instant::now()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Scan for expired entries if the scan interval has elapsed.
    ///
    /// Only one caller scans at a time; the rest skip.
    fn maybe_scan(&self, now: Instant) {
        let Some(mut last) = self.last_scan.try_lock() else {
            return;
        };
        if now.saturating_duration_since(*last) < self.config.expiration_scan_frequency {
            return;
        }
        *last = now;
        drop(last);

        self.purge_expired(now);
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn purge_expired(&self, now: Instant) -> usize {
        let removed = self.storage.drain_where(|_, e| e.is_expired_at(now));
        if removed > 0 {
            self.expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(removed, "L1 expiration scan");
        }
        removed
    }

    /// Evict until the size drops below `size_limit * (1 - compaction_percentage)`
    fn compact(&self) {
        let now = Instant::now();
        self.purge_expired(now);

        let target =
            (self.config.size_limit as f64 * (1.0 - self.config.compaction_percentage)) as u64;
        if self.storage.weight() <= target {
            return;
        }

        let mut by_age = self
            .storage
            .scan(|key, entry| Some((entry.last_access(), key.to_string())));
        by_age.sort_unstable();

        let mut evicted = 0u64;
        for (_, key) in by_age {
            if self.storage.weight() <= target {
                break;
            }
            if self.storage.remove(&key).is_some() {
                evicted += 1;
            }
        }

        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        tracing::debug!(evicted, size_bytes = self.size(), "L1 compaction");
    }

    /// Summed size hints of the stored entries
    pub fn size(&self) -> u64 {
        self.storage.weight()
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Get configuration
    pub fn config(&self) -> &L1Config {
        &self.config
    }

    /// Get cache statistics
    pub fn stats(&self) -> L1Stats {
        L1Stats {
            size: self.size(),
            size_limit: self.config.size_limit,
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

impl Default for L1Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for L1Cache {
    fn try_get(&self, key: &str) -> Option<LocalValue> {
        let now = Instant::now();
        self.maybe_scan(now);

        match self.storage.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                if self.storage.remove_if(key, |e| e.is_expired_at(now)).is_some() {
                    self.expirations.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                entry.touch(now);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn set(&self, key: String, value: LocalValue, expiration: &Expiration, size_hint: u64) {
        if size_hint > self.config.size_limit {
            tracing::debug!(key = %key, size_hint, "Entry larger than L1 size limit, skipping");
            self.storage.remove(&key);
            return;
        }

        self.storage
            .insert(key, LocalEntry::new(value, *expiration, size_hint));

        if self.size() > self.config.size_limit {
            self.compact();
        }
    }

    fn remove(&self, key: &str) -> bool {
        self.storage.remove(key).is_some()
    }

    fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.storage.check(key, |entry| !entry.is_expired_at(now))
    }

    fn keys_matching(&self, pattern: &str) -> Vec<String> {
        let pattern = match glob::Pattern::new(pattern) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(pattern, error = %e, "Invalid key pattern");
                return Vec::new();
            }
        };

        let now = Instant::now();
        self.storage.scan(|key, entry| {
            (!entry.is_expired_at(now) && pattern.matches(key)).then(|| key.to_string())
        })
    }

    fn clear(&self) {
        self.storage.clear();
    }
}

/// L1 cache statistics
#[derive(Debug, Clone)]
pub struct L1Stats {
    /// Current size in bytes
    pub size: u64,
    /// Size limit in bytes
    pub size_limit: u64,
    /// Number of entries
    pub entries: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Entries evicted by compaction
    pub evictions: u64,
    /// Entries dropped because they expired
    pub expirations: u64,
}

// =============================================================================
// Tests
// =============================================================================
