//! Two-Tier Cache
//!
//! An in-process L1 layered in front of a shared L2, with read-through
//! population, write-through invalidation, LZ4 compression, glob-based bulk
//! eviction and atomic counters.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          TieredCache                                 │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  KeyNamespace ──▶ L1 (LocalStore)  ──miss──▶ L2 (DistributedStore)   │
//! │                   ┌──────────────┐          ┌─────────────────────┐  │
//! │                   │ ShardedMap   │◀─promote─│ Memory / Redis      │  │
//! │                   │ typed values │          │ serialized bytes    │  │
//! │                   └──────────────┘          └─────────────────────┘  │
//! │                          │                            │              │
//! │                          └──────── CacheMetrics ──────┘              │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure Model
//!
//! Tier failures, timeouts, cancellations and corrupt payloads are logged
//! and degrade to a miss or a no-op. Only a `get_or_set` factory's own error
//! reaches the caller.

pub mod codec;
mod engine;
mod entry;
mod key;
mod l1;
mod l2;
mod metrics;
#[cfg(test)]
mod proptest;
#[cfg(feature = "redis-backend")]
mod redis;
mod shard;

pub use codec::{Codec, CompressionAlgorithm, Packed, DEFAULT_MAX_UNPACKED_BYTES};
pub use engine::{Backing, CacheTier, CacheValue, TieredCache};
pub use entry::{EntryOptions, Expiration, LocalEntry, LocalValue};
pub use key::{list_key, user_key, KeyNamespace};
pub use l1::{L1Cache, L1Config, L1Stats, LocalStore};
pub use l2::{DistributedStore, MemoryDistributedStore, StoreCapabilities, StoreStats};
pub use metrics::{CacheMetrics, CacheStatistics, KeyStatistics, LatencyTracker};
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisStore;
pub use shard::{ShardedMap, Weighted};

/// Number of shards in the local tier
pub const L1_SHARD_COUNT: usize = 64;

/// Number of keys reported in the top-key ranking
pub const TOP_KEYS_LIMIT: usize = 10;

/// Concurrent L2 deletes issued by pattern removal
pub const PATTERN_REMOVE_CONCURRENCY: usize = 16;
