//! Tiered Cache Engine
//!
//! Coordinates the local and distributed tiers behind one typed API.
//!
//! # Read Path
//!
//! ```text
//! get(key)
//!   ├─ L1 hit (same type) ─────────────────────────────▶ value
//!   └─ L1 miss ─▶ L2 get ─▶ unpack ─▶ L1 set (short TTL) ▶ value
//!                      └─ miss / error / timeout ──────▶ None
//! ```
//!
//! # Write Path
//!
//! Values are packed once; the packed bytes go to L2 and the typed value to
//! L1 with the packed length as its size hint. L2 is written first, but an L2
//! failure never skips the L1 write.
//!
//! # Failure Model
//!
//! Every L2 call runs under the configured operation timeout and, when a
//! cancellation token is attached, aborts as soon as the token fires. Tier
//! errors are logged with `op` and `key` fields and the operation degrades to
//! a miss or a no-op.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture};
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::codec::Codec;
use super::entry::{EntryOptions, Expiration};
use super::key::KeyNamespace;
use super::l1::{L1Cache, L1Config, LocalStore};
use super::l2::{DistributedStore, MemoryDistributedStore};
use super::metrics::{CacheMetrics, CacheStatistics, LatencyTracker};
use super::PATTERN_REMOVE_CONCURRENCY;
use crate::config::{CacheOptions, RedisOptions, StoreKind};
use crate::error::{Error, Result};

/// Values that can be cached in both tiers
pub trait CacheValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Which tier served a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    /// In-process tier
    L1,
    /// Distributed tier
    L2,
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheTier::L1 => write!(f, "L1"),
            CacheTier::L2 => write!(f, "L2"),
        }
    }
}

/// What sits behind the local tier
#[derive(Clone)]
pub enum Backing {
    /// The local tier is the only store
    LocalOnly,
    /// The local tier fronts a distributed store
    Tiered(Arc<dyn DistributedStore>),
}

impl std::fmt::Debug for Backing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backing::LocalOnly => write!(f, "LocalOnly"),
            Backing::Tiered(store) => write!(f, "Tiered({})", store.name()),
        }
    }
}

struct Inner {
    local: Arc<dyn LocalStore>,
    backing: Backing,
    codec: Codec,
    namespace: KeyNamespace,
    metrics: CacheMetrics,
    options: CacheOptions,
}

/// Two-tier cache handle. Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<Inner>,
    cancel: Option<CancellationToken>,
}

// =============================================================================
// Construction
// =============================================================================

impl TieredCache {
    /// Create a cache with the sharded L1 sized from `options.memory`
    pub fn new(options: CacheOptions, backing: Backing) -> Self {
        let local = Arc::new(L1Cache::with_config(L1Config::from(&options.memory)));
        Self::with_local_store(options, local, backing)
    }

    /// Create a cache over a caller-supplied local store
    pub fn with_local_store(
        options: CacheOptions,
        local: Arc<dyn LocalStore>,
        backing: Backing,
    ) -> Self {
        let codec = Codec::new(
            options.compression_enabled,
            options.compression_threshold_bytes,
        )
        .with_max_unpacked(options.max_entry_bytes);
        let namespace = KeyNamespace::new(options.key_prefix.clone());

        Self {
            inner: Arc::new(Inner {
                local,
                backing,
                codec,
                namespace,
                metrics: CacheMetrics::new(),
                options,
            }),
            cancel: None,
        }
    }

    /// Create a cache with no distributed tier
    pub fn local_only(options: CacheOptions) -> Self {
        Self::new(options, Backing::LocalOnly)
    }

    /// Validate `options` and build the backing store they name
    pub async fn from_options(options: CacheOptions) -> Result<Self> {
        options.validate()?;

        let backing = match options.store {
            StoreKind::Memory => Backing::LocalOnly,
            StoreKind::Distributed => Backing::Tiered(Arc::new(MemoryDistributedStore::new())),
            StoreKind::Redis => connect_redis(&options.redis).await?,
        };

        info!(
            store = %options.store,
            key_prefix = %options.key_prefix,
            compression = options.compression_enabled,
            "Tiered cache initialized"
        );
        Ok(Self::new(options, backing))
    }

    /// A handle whose L2 calls abort when `token` is cancelled
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cancel: Some(token),
        }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    pub fn backing(&self) -> &Backing {
        &self.inner.backing
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.inner.metrics
    }

    /// Snapshot of hit/miss accounting
    pub fn statistics(&self) -> CacheStatistics {
        self.inner.metrics.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.inner.metrics.reset();
    }

    /// Drop every L1 entry; L2 is untouched
    pub fn clear_local(&self) {
        self.inner.local.clear();
    }

    /// Check L2 with a presence lookup, returning the round-trip time.
    ///
    /// Unlike the cache operations this reports the failure instead of
    /// swallowing it. Always succeeds in local-only mode.
    pub async fn ping(&self) -> Result<Duration> {
        let Backing::Tiered(store) = &self.inner.backing else {
            return Ok(Duration::ZERO);
        };

        let sentinel = self.inner.namespace.full_key("__ping");
        let tracker = LatencyTracker::start();
        self.l2("ping", store.exists(&sentinel)).await?;
        Ok(tracker.elapsed())
    }
}

#[cfg(feature = "redis-backend")]
async fn connect_redis(options: &RedisOptions) -> Result<Backing> {
    let store = super::redis::RedisStore::connect(options).await?;
    Ok(Backing::Tiered(Arc::new(store)))
}

#[cfg(not(feature = "redis-backend"))]
async fn connect_redis(_options: &RedisOptions) -> Result<Backing> {
    Err(Error::Config(
        "redis store requires the redis-backend feature".into(),
    ))
}

fn log_failure(op: &'static str, key: &str, error: &Error) {
    if error.is_transient() {
        warn!(op, key, error = %error, "Cache tier call failed");
    } else {
        error!(op, key, error = %error, "Cache tier call failed");
    }
}

// =============================================================================
// Operations
// =============================================================================

impl TieredCache {
    /// Run an L2 call under the operation timeout and the cancellation token
    async fn l2<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let timeout = self.inner.options.operation_timeout();
        let timed = async {
            match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    operation,
                    timeout_ms: timeout.as_millis() as u64,
                }),
            }
        };

        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::Cancelled { operation }),
                    result = timed => result,
                }
            }
            None => timed.await,
        }
    }

    /// Fetch a value, trying L1 then L2.
    ///
    /// An L2 hit is copied into L1 with the short expiration. Any failure on
    /// the way is logged and reported as a miss.
    pub async fn get<T: CacheValue>(&self, key: &str) -> Option<T> {
        let inner = &self.inner;
        let full = inner.namespace.full_key(key);

        let local_hit = inner
            .local
            .try_get(&full)
            .and_then(|value| value.downcast_ref::<T>().cloned());
        if let Some(value) = local_hit {
            inner.metrics.record_hit(key);
            inner.metrics.record_tier_hit(CacheTier::L1);
            return Some(value);
        }

        let Backing::Tiered(store) = &inner.backing else {
            inner.metrics.record_miss(key);
            return None;
        };

        let tracker = LatencyTracker::start();
        let fetched = self.l2("get", store.get_bytes(&full)).await;
        inner.metrics.record_l2_read_latency(tracker.elapsed());

        let bytes = match fetched {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                inner.metrics.record_miss(key);
                return None;
            }
            Err(e) => {
                log_failure("get", key, &e);
                inner.metrics.record_miss(key);
                return None;
            }
        };

        match inner.codec.unpack::<T>(&bytes) {
            Ok(value) => {
                inner.local.set(
                    full,
                    Arc::new(value.clone()),
                    &Expiration::Absolute(inner.options.short_expiration()),
                    bytes.len() as u64,
                );
                inner.metrics.record_hit(key);
                inner.metrics.record_tier_hit(CacheTier::L2);
                Some(value)
            }
            Err(e) => {
                log_failure("get", key, &e);
                inner.metrics.record_miss(key);
                None
            }
        }
    }

    /// Store a value with an absolute expiration, or the configured default
    pub async fn set<T: CacheValue>(&self, key: &str, value: T, expiration: Option<Duration>) {
        let options = match expiration {
            Some(ttl) => EntryOptions::absolute(ttl),
            None => EntryOptions::default(),
        };
        self.set_with_options(key, value, options).await;
    }

    /// Store a value with absolute and/or sliding expiration
    pub async fn set_with_options<T: CacheValue>(&self, key: &str, value: T, options: EntryOptions) {
        let inner = &self.inner;
        let full = inner.namespace.full_key(key);
        let expiration = options.resolve(inner.options.default_expiration());

        let packed = match inner.codec.pack(&value) {
            Ok(packed) => packed,
            Err(e) => {
                log_failure("set", key, &e);
                return;
            }
        };

        if let Backing::Tiered(store) = &inner.backing {
            let remote_expiration = match expiration {
                Expiration::Sliding(window) if !store.capabilities().sliding_expiration => {
                    debug!(key, store = store.name(), "Sliding expiration unsupported, using absolute");
                    Expiration::Absolute(window)
                }
                other => other,
            };

            let write = store.set_bytes(&full, packed.bytes.clone(), &remote_expiration);
            if let Err(e) = self.l2("set", write).await {
                log_failure("set", key, &e);
            }
        }

        let size = packed.len() as u64;
        inner.local.set(full, Arc::new(value), &expiration, size);
        inner.metrics.record_set(key, size);
    }

    /// Remove a key from both tiers
    pub async fn remove(&self, key: &str) {
        let inner = &self.inner;
        let full = inner.namespace.full_key(key);

        inner.local.remove(&full);
        if let Backing::Tiered(store) = &inner.backing {
            if let Err(e) = self.l2("remove", store.remove_bytes(&full)).await {
                log_failure("remove", key, &e);
            }
        }
        inner.metrics.record_remove(key);
    }

    /// Remove every key matching a glob pattern, returning how many were removed.
    ///
    /// The key prefix matches literally, even if it contains glob
    /// characters; only `pattern` is interpreted. Without key enumeration
    /// support in L2 this logs a warning and removes nothing.
    pub async fn remove_by_pattern(&self, pattern: &str) -> usize {
        let inner = &self.inner;
        let full_pattern = inner.namespace.full_pattern(pattern);

        let store = match &inner.backing {
            Backing::LocalOnly => {
                let mut removed = 0;
                for full in inner.local.keys_matching(&full_pattern) {
                    if inner.local.remove(&full) {
                        inner.metrics.record_remove(self.logical(&full));
                        removed += 1;
                    }
                }
                debug!(pattern, removed, "Removed keys by pattern from L1");
                return removed;
            }
            Backing::Tiered(store) => store,
        };

        if !store.capabilities().enumerate_keys {
            warn!(
                op = "remove_by_pattern",
                pattern,
                store = store.name(),
                "Distributed store cannot enumerate keys, nothing removed"
            );
            return 0;
        }

        let keys = match self
            .l2("remove_by_pattern", store.enumerate_keys(&full_pattern))
            .await
        {
            Ok(keys) => keys,
            Err(e) => {
                log_failure("remove_by_pattern", pattern, &e);
                return 0;
            }
        };

        let removed = stream::iter(keys)
            .map(|full| async move {
                let deleted = match self.l2("remove_by_pattern", store.remove_bytes(&full)).await {
                    Ok(deleted) => deleted,
                    Err(e) => {
                        log_failure("remove_by_pattern", &full, &e);
                        false
                    }
                };
                self.inner.local.remove(&full);
                self.inner.metrics.record_remove(self.logical(&full));
                deleted
            })
            .buffer_unordered(PATTERN_REMOVE_CONCURRENCY)
            .filter(|deleted| future::ready(*deleted))
            .count()
            .await;

        // L1 copies whose L2 entry already expired
        for full in inner.local.keys_matching(&full_pattern) {
            inner.local.remove(&full);
        }

        debug!(pattern, removed, "Removed keys by pattern");
        removed
    }

    /// Return the cached value, or run `factory` once and cache its result.
    ///
    /// A factory returning `Ok(None)` caches nothing. Factory errors are
    /// returned unchanged. Concurrent misses on the same key each run their
    /// own factory.
    pub async fn get_or_set<T, F, Fut, E>(
        &self,
        key: &str,
        factory: F,
        expiration: Option<Duration>,
    ) -> std::result::Result<Option<T>, E>
    where
        T: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
    {
        if let Some(value) = self.get::<T>(key).await {
            return Ok(Some(value));
        }

        let produced = factory().await?;
        if let Some(value) = &produced {
            self.set(key, value.clone(), expiration).await;
        }
        Ok(produced)
    }

    /// [`get_or_set`](Self::get_or_set) for a synchronous, infallible factory
    pub async fn get_or_set_with<T, F>(
        &self,
        key: &str,
        factory: F,
        expiration: Option<Duration>,
    ) -> Option<T>
    where
        T: CacheValue,
        F: FnOnce() -> Option<T>,
    {
        if let Some(value) = self.get::<T>(key).await {
            return Some(value);
        }

        let produced = factory()?;
        self.set(key, produced.clone(), expiration).await;
        Some(produced)
    }

    /// Check presence in either tier without deserializing
    pub async fn exists(&self, key: &str) -> bool {
        let inner = &self.inner;
        let full = inner.namespace.full_key(key);

        if inner.local.contains(&full) {
            return true;
        }

        match &inner.backing {
            Backing::LocalOnly => false,
            Backing::Tiered(store) => match self.l2("exists", store.exists(&full)).await {
                Ok(found) => found,
                Err(e) => {
                    log_failure("exists", key, &e);
                    false
                }
            },
        }
    }

    /// Reset the sliding expiration clock of a key in L2
    pub async fn refresh(&self, key: &str) {
        let Backing::Tiered(store) = &self.inner.backing else {
            return;
        };
        if !store.capabilities().sliding_expiration {
            debug!(key, store = store.name(), "Refresh unsupported, skipping");
            return;
        }

        let full = self.inner.namespace.full_key(key);
        if let Err(e) = self.l2("refresh", store.refresh_ttl(&full)).await {
            log_failure("refresh", key, &e);
        }
    }

    /// Add `delta` to an integer counter, creating it at zero.
    ///
    /// Atomic when L2 supports native increments. Otherwise falls back to a
    /// read-modify-write through [`get`](Self::get) and [`set`](Self::set),
    /// which can lose updates under concurrent callers. Returns `None` on
    /// failure.
    pub async fn increment(&self, key: &str, delta: i64, expiration: Option<Duration>) -> Option<i64> {
        self.increment_counter("increment", key, delta, expiration)
            .await
    }

    /// Floating-point variant of [`increment`](Self::increment)
    pub async fn increment_f64(
        &self,
        key: &str,
        delta: f64,
        expiration: Option<Duration>,
    ) -> Option<f64> {
        self.increment_counter("increment_f64", key, delta, expiration)
            .await
    }

    async fn increment_counter<N: CounterValue>(
        &self,
        op: &'static str,
        key: &str,
        delta: N,
        expiration: Option<Duration>,
    ) -> Option<N> {
        let inner = &self.inner;

        if let Backing::Tiered(store) = &inner.backing {
            if store.capabilities().atomic_increment {
                let full = inner.namespace.full_key(key);
                let result = self
                    .l2(op, N::native_increment(&**store, &full, delta))
                    .await;
                // The L1 copy is now stale
                inner.local.remove(&full);

                let value = match result {
                    Ok(value) => value,
                    Err(e) => {
                        log_failure(op, key, &e);
                        return None;
                    }
                };

                if let Some(ttl) = expiration {
                    if let Err(e) = self.l2("expire", store.expire(&full, ttl)).await {
                        log_failure("expire", key, &e);
                    }
                }
                return Some(value);
            }
        }

        // Read-modify-write; concurrent callers can lose updates here
        let current = self.get::<N>(key).await.unwrap_or_default();
        let Some(next) = current.add_checked(delta) else {
            log_failure(op, key, &Error::Overflow { key: key.to_string() });
            return None;
        };
        self.set(key, next, expiration).await;
        Some(next)
    }

    fn logical<'a>(&self, full: &'a str) -> &'a str {
        self.inner.namespace.logical_key(full).unwrap_or(full)
    }
}

/// Numeric types usable as counters
trait CounterValue: CacheValue + Copy + Default {
    fn add_checked(self, delta: Self) -> Option<Self>;

    fn native_increment<'a>(
        store: &'a dyn DistributedStore,
        key: &'a str,
        delta: Self,
    ) -> BoxFuture<'a, Result<Self>>;
}

impl CounterValue for i64 {
    fn add_checked(self, delta: Self) -> Option<Self> {
        self.checked_add(delta)
    }

    fn native_increment<'a>(
        store: &'a dyn DistributedStore,
        key: &'a str,
        delta: Self,
    ) -> BoxFuture<'a, Result<Self>> {
        store.atomic_increment(key, delta)
    }
}

impl CounterValue for f64 {
    fn add_checked(self, delta: Self) -> Option<Self> {
        Some(self + delta).filter(|sum| sum.is_finite())
    }

    fn native_increment<'a>(
        store: &'a dyn DistributedStore,
        key: &'a str,
        delta: Self,
    ) -> BoxFuture<'a, Result<Self>> {
        store.atomic_increment_f64(key, delta)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::l2::StoreCapabilities;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Session {
        user_id: u64,
        roles: Vec<String>,
    }

    fn options() -> CacheOptions {
        CacheOptions {
            key_prefix: "test:".into(),
            ..CacheOptions::default()
        }
    }

    fn tiered(store: Arc<MemoryDistributedStore>) -> TieredCache {
        TieredCache::new(options(), Backing::Tiered(store))
    }

    #[tokio::test]
    async fn test_set_writes_both_tiers() {
        let store = Arc::new(MemoryDistributedStore::new());
        let cache = tiered(Arc::clone(&store));

        cache.set("n", 42u32, None).await;

        assert!(store.exists("test:n").await.unwrap());
        assert_eq!(cache.get::<u32>("n").await, Some(42));
        assert_eq!(cache.statistics().l1_hits, 1);
    }

    #[tokio::test]
    async fn test_l2_hit_repopulates_l1() {
        let store = Arc::new(MemoryDistributedStore::new());
        let writer = tiered(Arc::clone(&store));
        let reader = tiered(Arc::clone(&store));

        let session = Session {
            user_id: 9,
            roles: vec!["admin".into()],
        };
        writer.set("s", session.clone(), None).await;

        assert_eq!(reader.get::<Session>("s").await, Some(session.clone()));
        assert_eq!(reader.get::<Session>("s").await, Some(session));

        let stats = reader.statistics();
        assert_eq!(stats.l2_hits, 1);
        assert_eq!(stats.l1_hits, 1);
    }

    #[tokio::test]
    async fn test_type_mismatch_in_l1_falls_through() {
        let cache = tiered(Arc::new(MemoryDistributedStore::new()));
        cache.set("n", 7i64, None).await;

        // Same JSON, different Rust type
        assert_eq!(cache.get::<u8>("n").await, Some(7));
        assert_eq!(cache.get::<String>("n").await, None);
    }

    #[tokio::test]
    async fn test_local_only_round_trip() {
        let cache = TieredCache::local_only(options());

        cache.set("k", "v".to_string(), None).await;
        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));
        assert!(cache.exists("k").await);

        cache.remove("k").await;
        assert!(!cache.exists("k").await);
        assert_eq!(cache.get::<String>("k").await, None);
    }

    #[tokio::test]
    async fn test_sliding_downgraded_without_capability() {
        let store = Arc::new(MemoryDistributedStore::with_capabilities(StoreCapabilities {
            sliding_expiration: false,
            ..StoreCapabilities::ALL
        }));
        let cache = tiered(Arc::clone(&store));

        cache
            .set_with_options("k", 1u8, EntryOptions::sliding(Duration::from_millis(30)))
            .await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!store.exists("test:k").await.unwrap());
    }

    #[tokio::test]
    async fn test_native_increment_invalidates_l1() {
        let cache = tiered(Arc::new(MemoryDistributedStore::new()));

        cache.set("c", 10i64, None).await;
        assert_eq!(cache.increment("c", 5, None).await, Some(15));
        assert_eq!(cache.get::<i64>("c").await, Some(15));
    }

    #[tokio::test]
    async fn test_increment_f64() {
        let cache = tiered(Arc::new(MemoryDistributedStore::new()));

        assert_eq!(cache.increment_f64("score", 1.25, None).await, Some(1.25));
        assert_eq!(cache.increment_f64("score", 0.5, None).await, Some(1.75));

        let local = TieredCache::local_only(options());
        assert_eq!(local.increment_f64("score", 2.5, None).await, Some(2.5));
        assert_eq!(local.increment_f64("score", 2.5, None).await, Some(5.0));
    }

    #[tokio::test]
    async fn test_increment_on_non_number_fails() {
        let cache = tiered(Arc::new(MemoryDistributedStore::new()));
        cache.set("name", "ada".to_string(), None).await;

        assert_eq!(cache.increment("name", 1, None).await, None);
    }

    #[tokio::test]
    async fn test_fallback_increment_overflow() {
        let cache = TieredCache::local_only(options());
        cache.set("c", i64::MAX, None).await;

        assert_eq!(cache.increment("c", 1, None).await, None);
        assert_eq!(cache.get::<i64>("c").await, Some(i64::MAX));
    }

    #[tokio::test]
    async fn test_refresh_local_only_is_noop() {
        let cache = TieredCache::local_only(options());
        cache.refresh("missing").await;
        assert_eq!(cache.statistics().total_requests, 0);
    }

    #[tokio::test]
    async fn test_clear_local_keeps_l2() {
        let cache = tiered(Arc::new(MemoryDistributedStore::new()));
        cache.set("k", 1u8, None).await;

        cache.clear_local();

        assert_eq!(cache.get::<u8>("k").await, Some(1));
        assert_eq!(cache.statistics().l2_hits, 1);
    }

    #[tokio::test]
    async fn test_from_options() {
        let cache = TieredCache::from_options(CacheOptions::default())
            .await
            .unwrap();
        assert!(matches!(cache.backing(), Backing::LocalOnly));

        let distributed = CacheOptions {
            store: StoreKind::Distributed,
            ..CacheOptions::default()
        };
        let cache = TieredCache::from_options(distributed).await.unwrap();
        assert!(matches!(cache.backing(), Backing::Tiered(_)));

        let invalid = CacheOptions {
            default_expiration_minutes: 0,
            ..CacheOptions::default()
        };
        assert!(TieredCache::from_options(invalid).await.is_err());
    }

    #[tokio::test]
    async fn test_statistics_reset() {
        let cache = TieredCache::local_only(options());
        cache.get::<u8>("missing").await;
        cache.set("k", 1u8, None).await;

        cache.reset_statistics();

        let stats = cache.statistics();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.total_sets, 0);
        assert_eq!(stats.key_count, 0);
    }

    #[test]
    fn test_cache_tier_display() {
        assert_eq!(CacheTier::L1.to_string(), "L1");
        assert_eq!(format!("{:?}", Backing::LocalOnly), "LocalOnly");
    }
}
