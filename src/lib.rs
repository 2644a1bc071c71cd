//! tiercache - Two-Tier Cache Service
//!
//! An in-process L1 cache layered in front of a distributed L2 cache, with
//! read-through population, write-through invalidation, LZ4 compression of
//! large payloads, glob-based bulk eviction and atomic counters.
//!
//! # Architecture
//!
//! ```text
//! caller ─▶ KeyNamespace ─▶ L1 (typed, in-process) ─miss─▶ L2 (bytes, shared)
//!                                  ▲                           │
//!                                  └──────── promote ──────────┘
//! ```
//!
//! Tier failures never reach the caller: they are logged and degrade to a
//! miss or a no-op.
//!
//! # Modules
//!
//! - [`cache`] - Tiers, codec, metrics and the [`TieredCache`] engine
//! - [`config`] - `CacheOptions` and its YAML loader
//! - [`error`] - Error types
//! - [`monitoring`] - Prometheus exposition and health checks
//!
//! # Example
//!
//! ```
//! use tiercache::{CacheOptions, TieredCache};
//!
//! # tokio_test::block_on(async {
//! let cache = TieredCache::local_only(CacheOptions::default());
//!
//! cache.set("greeting", "hello".to_string(), None).await;
//! assert_eq!(cache.get::<String>("greeting").await.as_deref(), Some("hello"));
//!
//! assert_eq!(cache.increment("visits", 5, None).await, Some(5));
//! assert_eq!(cache.increment("visits", 3, None).await, Some(8));
//! # });
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod monitoring;

pub use cache::{
    list_key, user_key, Backing, CacheStatistics, DistributedStore, EntryOptions, Expiration,
    MemoryDistributedStore, StoreCapabilities, TieredCache,
};
pub use config::{CacheOptions, StoreKind};
pub use error::{Error, Result};
