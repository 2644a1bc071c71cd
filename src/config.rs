//! Cache configuration
//!
//! `CacheOptions` is loaded once at startup from a YAML file (camelCase keys,
//! every field optional) and optionally overridden from the command line.
//! It is read-only afterwards.
//!
//! ```yaml
//! store: redis
//! defaultExpirationMinutes: 30
//! compressionThresholdBytes: 2048
//! keyPrefix: "accounts:"
//! memory:
//!   sizeLimit: 50000000
//! redis:
//!   url: redis://cache.internal:6379
//!   database: 2
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which distributed tier sits behind the local cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Local tier only
    #[default]
    Memory,
    /// In-process distributed tier
    Distributed,
    /// Redis distributed tier
    Redis,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Memory => write!(f, "memory"),
            StoreKind::Distributed => write!(f, "distributed"),
            StoreKind::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "distributed" => Ok(StoreKind::Distributed),
            "redis" => Ok(StoreKind::Redis),
            other => Err(Error::Config(format!("unknown store kind: {}", other))),
        }
    }
}

/// Top-level cache options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheOptions {
    /// Backing topology
    #[serde(default)]
    pub store: StoreKind,

    /// Expiration applied when a write names none.
    #[serde(default = "default_expiration_minutes")]
    pub default_expiration_minutes: u64,

    /// Expiration of L1 copies promoted from L2.
    #[serde(default = "default_short_expiration_minutes")]
    pub short_expiration_minutes: u64,

    /// Expiration for slow-changing data, available to callers.
    #[serde(default = "default_long_expiration_minutes")]
    pub long_expiration_minutes: u64,

    /// Compress payloads above the threshold.
    #[serde(default = "default_true")]
    pub compression_enabled: bool,

    /// Payloads strictly larger than this are compressed.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold_bytes: usize,

    /// Prepended to every logical key in both tiers.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Upper bound on any single L2 call.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Largest serialized value a compressed L2 payload may expand to.
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,

    #[serde(default)]
    pub memory: MemoryOptions,

    #[serde(default)]
    pub redis: RedisOptions,
}

/// Local tier sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryOptions {
    /// Maximum total size hint in bytes
    #[serde(default = "default_size_limit")]
    pub size_limit: u64,

    /// Fraction of the limit freed when compacting
    #[serde(default = "default_compaction_percentage")]
    pub compaction_percentage: f64,

    /// Minutes between expiration scans
    #[serde(default = "default_scan_frequency_minutes")]
    pub expiration_scan_frequency_minutes: u64,
}

/// Redis connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisOptions {
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Prefix applied by the store beneath the key prefix
    #[serde(default)]
    pub instance_name: String,

    #[serde(default)]
    pub database: i64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Client-side response timeout
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Additional connection attempts after the first
    #[serde(default = "default_connect_retry")]
    pub connect_retry: u32,
}

fn default_expiration_minutes() -> u64 {
    30
}

fn default_short_expiration_minutes() -> u64 {
    5
}

fn default_long_expiration_minutes() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_compression_threshold() -> usize {
    1024
}

fn default_key_prefix() -> String {
    "tiercache:".to_string()
}

fn default_operation_timeout_ms() -> u64 {
    5000
}

fn default_max_entry_bytes() -> usize {
    crate::cache::DEFAULT_MAX_UNPACKED_BYTES
}

fn default_size_limit() -> u64 {
    100_000_000
}

fn default_compaction_percentage() -> f64 {
    0.25
}

fn default_scan_frequency_minutes() -> u64 {
    5
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_connect_retry() -> u32 {
    3
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            default_expiration_minutes: default_expiration_minutes(),
            short_expiration_minutes: default_short_expiration_minutes(),
            long_expiration_minutes: default_long_expiration_minutes(),
            compression_enabled: true,
            compression_threshold_bytes: default_compression_threshold(),
            key_prefix: default_key_prefix(),
            operation_timeout_ms: default_operation_timeout_ms(),
            max_entry_bytes: default_max_entry_bytes(),
            memory: MemoryOptions::default(),
            redis: RedisOptions::default(),
        }
    }
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            size_limit: default_size_limit(),
            compaction_percentage: default_compaction_percentage(),
            expiration_scan_frequency_minutes: default_scan_frequency_minutes(),
        }
    }
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            instance_name: String::new(),
            database: 0,
            connect_timeout_ms: default_connect_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            connect_retry: default_connect_retry(),
        }
    }
}

impl CacheOptions {
    /// Load and validate options from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate options from YAML text
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let options: Self = serde_yaml::from_str(raw)?;
        options.validate()?;
        Ok(options)
    }

    pub fn default_expiration(&self) -> Duration {
        minutes(self.default_expiration_minutes)
    }

    pub fn short_expiration(&self) -> Duration {
        minutes(self.short_expiration_minutes)
    }

    pub fn long_expiration(&self) -> Duration {
        minutes(self.long_expiration_minutes)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.default_expiration_minutes == 0
            || self.short_expiration_minutes == 0
            || self.long_expiration_minutes == 0
        {
            return Err(Error::Config("expiration minutes must be > 0".into()));
        }
        check_minutes("defaultExpirationMinutes", self.default_expiration_minutes)?;
        check_minutes("shortExpirationMinutes", self.short_expiration_minutes)?;
        check_minutes("longExpirationMinutes", self.long_expiration_minutes)?;
        if self.operation_timeout_ms == 0 {
            return Err(Error::Config("operationTimeoutMs must be > 0".into()));
        }
        if self.max_entry_bytes == 0 || self.max_entry_bytes > i32::MAX as usize {
            return Err(Error::Config(
                "maxEntryBytes must be in 1..=2147483647".into(),
            ));
        }
        self.memory.validate()?;
        if self.store == StoreKind::Redis {
            self.redis.validate()?;
        }
        Ok(())
    }
}

impl MemoryOptions {
    pub fn expiration_scan_frequency(&self) -> Duration {
        minutes(self.expiration_scan_frequency_minutes)
    }

    fn validate(&self) -> Result<()> {
        if self.size_limit == 0 {
            return Err(Error::Config("memory.sizeLimit must be > 0".into()));
        }
        if !(self.compaction_percentage > 0.0 && self.compaction_percentage <= 1.0) {
            return Err(Error::Config(
                "memory.compactionPercentage must be in (0.0, 1.0]".into(),
            ));
        }
        check_minutes(
            "memory.expirationScanFrequencyMinutes",
            self.expiration_scan_frequency_minutes,
        )?;
        Ok(())
    }
}

impl RedisOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("redis.url is required for the redis store".into()));
        }
        if self.database < 0 {
            return Err(Error::Config("redis.database must be >= 0".into()));
        }
        Ok(())
    }
}

/// Largest minute count whose length in seconds fits a `u64`
const MAX_MINUTES: u64 = u64::MAX / 60;

fn check_minutes(field: &str, n: u64) -> Result<()> {
    if n > MAX_MINUTES {
        return Err(Error::Config(format!(
            "{} must be <= {}",
            field, MAX_MINUTES
        )));
    }
    Ok(())
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let options = CacheOptions::default();

        assert_eq!(options.store, StoreKind::Memory);
        assert_eq!(options.default_expiration(), Duration::from_secs(30 * 60));
        assert_eq!(options.short_expiration(), Duration::from_secs(5 * 60));
        assert_eq!(options.long_expiration(), Duration::from_secs(120 * 60));
        assert!(options.compression_enabled);
        assert_eq!(options.compression_threshold_bytes, 1024);
        assert_eq!(options.memory.size_limit, 100_000_000);
        assert_eq!(options.memory.compaction_percentage, 0.25);
        assert_eq!(
            options.memory.expiration_scan_frequency(),
            Duration::from_secs(300)
        );
        assert_eq!(options.redis.connect_retry, 3);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let options = CacheOptions::from_yaml(
            r#"
store: distributed
keyPrefix: "accounts:"
memory:
  sizeLimit: 4096
"#,
        )
        .unwrap();

        assert_eq!(options.store, StoreKind::Distributed);
        assert_eq!(options.key_prefix, "accounts:");
        assert_eq!(options.memory.size_limit, 4096);
        assert_eq!(options.memory.compaction_percentage, 0.25);
        assert_eq!(options.default_expiration_minutes, 30);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let options = CacheOptions::from_yaml("{}").unwrap();
        assert_eq!(options, CacheOptions::default());
    }

    #[test]
    fn test_validation() {
        let mut options = CacheOptions::default();
        options.short_expiration_minutes = 0;
        assert_matches!(options.validate(), Err(Error::Config(_)));

        let mut options = CacheOptions::default();
        options.memory.compaction_percentage = 1.5;
        assert_matches!(options.validate(), Err(Error::Config(_)));

        let mut options = CacheOptions::default();
        options.store = StoreKind::Redis;
        options.redis.url = String::new();
        assert_matches!(options.validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_oversized_minutes_rejected() {
        assert_matches!(
            CacheOptions::from_yaml("defaultExpirationMinutes: 18446744073709551615"),
            Err(Error::Config(msg)) if msg.contains("defaultExpirationMinutes")
        );
        assert_matches!(
            CacheOptions::from_yaml("memory:\n  expirationScanFrequencyMinutes: 18446744073709551615"),
            Err(Error::Config(_))
        );

        let max = CacheOptions {
            long_expiration_minutes: MAX_MINUTES,
            ..CacheOptions::default()
        };
        assert!(max.validate().is_ok());
        assert_eq!(max.long_expiration().as_secs(), MAX_MINUTES * 60);

        // Unvalidated options saturate instead of overflowing
        let unchecked = CacheOptions {
            default_expiration_minutes: u64::MAX,
            ..CacheOptions::default()
        };
        assert_eq!(unchecked.default_expiration(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_max_entry_bytes_bounds() {
        let mut options = CacheOptions::default();
        assert_eq!(options.max_entry_bytes, 64 * 1024 * 1024);

        options.max_entry_bytes = 0;
        assert_matches!(options.validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_bad_yaml() {
        assert_matches!(
            CacheOptions::from_yaml("store: [not, a, kind]"),
            Err(Error::Yaml(_))
        );
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("tiercache-{}.yaml", std::process::id()));
        std::fs::write(&path, "store: redis\nredis:\n  database: 3\n").unwrap();

        let options = CacheOptions::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(options.store, StoreKind::Redis);
        assert_eq!(options.redis.database, 3);

        assert_matches!(
            CacheOptions::load("/nonexistent/tiercache.yaml"),
            Err(Error::Io(_))
        );
    }

    #[test]
    fn test_store_kind_parse() {
        assert_eq!("Redis".parse::<StoreKind>().unwrap(), StoreKind::Redis);
        assert!("memcached".parse::<StoreKind>().is_err());
        assert_eq!(StoreKind::Distributed.to_string(), "distributed");
    }
}
