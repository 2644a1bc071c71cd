//! L2 Cache - Distributed Tier
//!
//! The shared tier holds serialized bytes only. Stores advertise optional
//! capabilities (key enumeration, atomic increment, sliding expiration) and
//! the engine checks them before use instead of assuming.
//!
//! [`MemoryDistributedStore`] is an in-process implementation of the
//! contract, used for single-node deployments and tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::entry::{deadline, Expiration};
use crate::error::{Error, Result};

/// Optional features a distributed store may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// Glob enumeration of stored keys
    pub enumerate_keys: bool,
    /// Race-free numeric increment
    pub atomic_increment: bool,
    /// Sliding expiration and TTL refresh
    pub sliding_expiration: bool,
}

impl StoreCapabilities {
    /// A plain get/set/remove store
    pub const NONE: Self = Self {
        enumerate_keys: false,
        atomic_increment: false,
        sliding_expiration: false,
    };

    /// Every optional capability
    pub const ALL: Self = Self {
        enumerate_keys: true,
        atomic_increment: true,
        sliding_expiration: true,
    };
}

/// Contract for the shared tier
#[async_trait]
pub trait DistributedStore: Send + Sync {
    /// Store name for logs
    fn name(&self) -> &'static str;

    /// Optional capabilities offered by this store
    fn capabilities(&self) -> StoreCapabilities;

    /// Fetch the stored bytes for a key
    async fn get_bytes(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store bytes under a key with the given expiration
    async fn set_bytes(&self, key: &str, value: Bytes, expiration: &Expiration) -> Result<()>;

    /// Delete a key, returning whether it existed
    async fn remove_bytes(&self, key: &str) -> Result<bool>;

    /// Reset the sliding expiration clock without touching the value
    async fn refresh_ttl(&self, key: &str) -> Result<()>;

    /// Presence check
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get_bytes(key).await?.is_some())
    }

    /// Keys matching a glob pattern
    async fn enumerate_keys(&self, _pattern: &str) -> Result<Vec<String>> {
        Err(Error::Unsupported {
            store: self.name(),
            capability: "enumerate_keys",
        })
    }

    /// Atomically add `delta` to an integer value, creating it at zero
    async fn atomic_increment(&self, _key: &str, _delta: i64) -> Result<i64> {
        Err(Error::Unsupported {
            store: self.name(),
            capability: "atomic_increment",
        })
    }

    /// Atomically add `delta` to a float value, creating it at zero
    async fn atomic_increment_f64(&self, _key: &str, _delta: f64) -> Result<f64> {
        Err(Error::Unsupported {
            store: self.name(),
            capability: "atomic_increment",
        })
    }

    /// Set an absolute TTL on an existing key
    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool> {
        Err(Error::Unsupported {
            store: self.name(),
            capability: "expire",
        })
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

#[derive(Debug, Clone)]
struct StoredValue {
    data: Bytes,
    expires_at: Option<Instant>,
    sliding: Option<Duration>,
}

impl StoredValue {
    fn new(data: Bytes, expiration: &Expiration, now: Instant) -> Self {
        match *expiration {
            Expiration::Absolute(ttl) => Self {
                data,
                expires_at: deadline(now, ttl),
                sliding: None,
            },
            Expiration::Sliding(window) => Self {
                data,
                expires_at: deadline(now, window),
                sliding: Some(window),
            },
            Expiration::Never => Self {
                data,
                expires_at: None,
                sliding: None,
            },
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn touch(&mut self, now: Instant) {
        if let Some(window) = self.sliding {
            self.expires_at = deadline(now, window);
        }
    }
}

/// Parse a stored counter; stored counters are plain decimal text
fn parse_number<N: std::str::FromStr>(data: &[u8]) -> Option<N> {
    std::str::from_utf8(data).ok()?.trim().parse().ok()
}

/// In-memory store statistics
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Live and not-yet-purged entries
    pub entries: usize,
    /// Read operations
    pub reads: u64,
    /// Write operations
    pub writes: u64,
    /// Delete operations
    pub deletes: u64,
}

/// In-process implementation of [`DistributedStore`]
///
/// Uses DashMap for concurrent access. Expired entries are dropped lazily
/// when touched or enumerated.
pub struct MemoryDistributedStore {
    entries: DashMap<String, StoredValue>,
    capabilities: StoreCapabilities,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl Default for MemoryDistributedStore {
    fn default() -> Self {
        Self::with_capabilities(StoreCapabilities::ALL)
    }
}

impl MemoryDistributedStore {
    /// Create a store offering every capability
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store offering only the given capabilities
    pub fn with_capabilities(capabilities: StoreCapabilities) -> Self {
        Self {
            entries: DashMap::new(),
            capabilities,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.entries.len(),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    fn require(&self, enabled: bool, capability: &'static str) -> Result<()> {
        if enabled {
            Ok(())
        } else {
            Err(Error::Unsupported {
                store: self.name(),
                capability,
            })
        }
    }

    fn increment_with<N>(&self, key: &str, delta: N, add: impl Fn(N, N) -> Option<N>) -> Result<N>
    where
        N: Copy + std::str::FromStr + std::string::ToString,
    {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if !occupied.get().is_expired(now) => {
                let current: N =
                    parse_number(&occupied.get().data).ok_or_else(|| Error::NotANumber {
                        key: key.to_string(),
                    })?;
                let next = add(current, delta).ok_or_else(|| Error::Overflow {
                    key: key.to_string(),
                })?;
                occupied.get_mut().data = Bytes::from(next.to_string());
                Ok(next)
            }
            Entry::Occupied(mut occupied) => {
                occupied.insert(StoredValue::new(
                    Bytes::from(delta.to_string()),
                    &Expiration::Never,
                    now,
                ));
                Ok(delta)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(
                    Bytes::from(delta.to_string()),
                    &Expiration::Never,
                    now,
                ));
                Ok(delta)
            }
        }
    }
}

#[async_trait]
impl DistributedStore for MemoryDistributedStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        let live = match self.entries.get_mut(key) {
            Some(mut stored) if !stored.is_expired(now) => {
                stored.touch(now);
                Some(stored.data.clone())
            }
            Some(_) => None,
            None => return Ok(None),
        };

        if live.is_none() {
            self.entries.remove_if(key, |_, stored| stored.is_expired(now));
        }
        Ok(live)
    }

    async fn set_bytes(&self, key: &str, value: Bytes, expiration: &Expiration) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key.to_string(),
            StoredValue::new(value, expiration, Instant::now()),
        );
        Ok(())
    }

    async fn remove_bytes(&self, key: &str) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.remove(key).is_some())
    }

    async fn refresh_ttl(&self, key: &str) -> Result<()> {
        self.require(self.capabilities.sliding_expiration, "sliding_expiration")?;
        let now = Instant::now();
        if let Some(mut stored) = self.entries.get_mut(key) {
            if !stored.is_expired(now) {
                stored.touch(now);
            }
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .is_some_and(|stored| !stored.is_expired(now)))
    }

    async fn enumerate_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.require(self.capabilities.enumerate_keys, "enumerate_keys")?;
        let matcher = glob::Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|stored| !stored.value().is_expired(now) && matcher.matches(stored.key()))
            .map(|stored| stored.key().clone())
            .collect())
    }

    async fn atomic_increment(&self, key: &str, delta: i64) -> Result<i64> {
        self.require(self.capabilities.atomic_increment, "atomic_increment")?;
        self.increment_with(key, delta, i64::checked_add)
    }

    async fn atomic_increment_f64(&self, key: &str, delta: f64) -> Result<f64> {
        self.require(self.capabilities.atomic_increment, "atomic_increment")?;
        self.increment_with(key, delta, |a, b| Some(a + b).filter(|sum| sum.is_finite()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut stored) if !stored.is_expired(now) => {
                stored.expires_at = deadline(now, ttl);
                stored.sliding = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryDistributedStore::new();
        store
            .set_bytes("k", Bytes::from_static(b"v"), &Expiration::Never)
            .await
            .unwrap();

        assert_eq!(
            store.get_bytes("k").await.unwrap(),
            Some(Bytes::from_static(b"v"))
        );
        assert!(store.exists("k").await.unwrap());
        assert!(store.remove_bytes("k").await.unwrap());
        assert!(!store.remove_bytes("k").await.unwrap());
        assert_eq!(store.get_bytes("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_huge_ttls_never_expire() {
        let store = MemoryDistributedStore::new();
        let data = Bytes::from_static(b"v");

        store
            .set_bytes("abs", data.clone(), &Expiration::Absolute(Duration::MAX))
            .await
            .unwrap();
        store
            .set_bytes("sld", data.clone(), &Expiration::Sliding(Duration::MAX))
            .await
            .unwrap();

        assert_eq!(store.get_bytes("abs").await.unwrap(), Some(data.clone()));
        assert_eq!(store.get_bytes("sld").await.unwrap(), Some(data));
        store.refresh_ttl("sld").await.unwrap();
        assert!(store.exists("sld").await.unwrap());

        assert_eq!(store.atomic_increment("n", 1).await.unwrap(), 1);
        assert!(store.expire("n", Duration::MAX).await.unwrap());
        assert_eq!(store.enumerate_keys("*").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_absolute_expiration() {
        let store = MemoryDistributedStore::new();
        store
            .set_bytes(
                "k",
                Bytes::from_static(b"v"),
                &Expiration::Absolute(Duration::from_millis(20)),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get_bytes("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sliding_refresh_keeps_entry_alive() {
        let store = MemoryDistributedStore::new();
        store
            .set_bytes(
                "k",
                Bytes::from_static(b"v"),
                &Expiration::Sliding(Duration::from_millis(80)),
            )
            .await
            .unwrap();

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            store.refresh_ttl("k").await.unwrap();
        }

        assert!(store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_enumerate_keys_glob() {
        let store = MemoryDistributedStore::new();
        for key in ["p:user:1", "p:user:2", "p:order:1"] {
            store
                .set_bytes(key, Bytes::from_static(b"x"), &Expiration::Never)
                .await
                .unwrap();
        }

        let mut keys = store.enumerate_keys("p:user:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["p:user:1", "p:user:2"]);

        let err = store.enumerate_keys("p:[").await.unwrap_err();
        assert_matches!(err, Error::InvalidPattern { .. });
    }

    #[tokio::test]
    async fn test_capabilities_are_enforced() {
        let store = MemoryDistributedStore::with_capabilities(StoreCapabilities::NONE);

        assert_matches!(
            store.enumerate_keys("*").await,
            Err(Error::Unsupported {
                capability: "enumerate_keys",
                ..
            })
        );
        assert_matches!(
            store.atomic_increment("c", 1).await,
            Err(Error::Unsupported { .. })
        );
        assert_matches!(store.refresh_ttl("c").await, Err(Error::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_atomic_increment() {
        let store = MemoryDistributedStore::new();

        assert_eq!(store.atomic_increment("c", 5).await.unwrap(), 5);
        assert_eq!(store.atomic_increment("c", 3).await.unwrap(), 8);
        assert_eq!(
            store.get_bytes("c").await.unwrap(),
            Some(Bytes::from_static(b"8"))
        );

        assert_eq!(store.atomic_increment_f64("f", 1.5).await.unwrap(), 1.5);
        assert_eq!(store.atomic_increment_f64("f", 2.0).await.unwrap(), 3.5);
    }

    #[tokio::test]
    async fn test_increment_rejects_non_numbers() {
        let store = MemoryDistributedStore::new();
        store
            .set_bytes("s", Bytes::from_static(b"\"text\""), &Expiration::Never)
            .await
            .unwrap();

        assert_matches!(
            store.atomic_increment("s", 1).await,
            Err(Error::NotANumber { .. })
        );

        store
            .set_bytes("max", Bytes::from(i64::MAX.to_string()), &Expiration::Never)
            .await
            .unwrap();
        assert_matches!(
            store.atomic_increment("max", 1).await,
            Err(Error::Overflow { .. })
        );
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_race_free() {
        let store = Arc::new(MemoryDistributedStore::new());
        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.atomic_increment("hits", 2).await })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        assert_eq!(store.atomic_increment("hits", 0).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_expire_sets_ttl() {
        let store = MemoryDistributedStore::new();
        store.atomic_increment("c", 1).await.unwrap();

        assert!(store.expire("c", Duration::from_millis(20)).await.unwrap());
        assert!(!store.expire("missing", Duration::from_secs(1)).await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.exists("c").await.unwrap());
    }
}
