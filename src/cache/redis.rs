//! Redis-backed distributed tier
//!
//! Each entry is a hash with a `data` field holding the payload and, for
//! sliding entries, an `sld` field holding the window in milliseconds. The
//! key TTL carries the expiration; reads of a sliding entry push it forward.
//!
//! Counters live in the same `data` field, so `HINCRBY`/`HINCRBYFLOAT` work
//! on values written through [`DistributedStore::set_bytes`] and the result
//! stays readable by the codec.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, IntoConnectionInfo, RedisError};
use tracing::{info, warn};

use super::entry::Expiration;
use super::l2::{DistributedStore, StoreCapabilities};
use crate::config::RedisOptions;
use crate::error::{Error, Result};

const DATA_FIELD: &str = "data";
const SLIDING_FIELD: &str = "sld";
const SCAN_BATCH: usize = 500;
const BASE_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 10_000;

/// Redis implementation of [`DistributedStore`]
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    instance_name: String,
}

impl RedisStore {
    /// Connect, retrying `connect_retry` times with exponential backoff
    pub async fn connect(options: &RedisOptions) -> Result<Self> {
        let mut info = options.url.as_str().into_connection_info()?;
        info.redis.db = options.database;
        let client = redis::Client::open(info)?;

        let mut attempt = 0u32;
        loop {
            let connecting = client.get_multiplexed_async_connection_with_timeouts(
                options.operation_timeout(),
                options.connect_timeout(),
            );
            match connecting.await {
                Ok(connection) => {
                    info!(
                        url = %options.url,
                        database = options.database,
                        attempts = attempt + 1,
                        "Connected to Redis"
                    );
                    return Ok(Self {
                        connection,
                        instance_name: options.instance_name.clone(),
                    });
                }
                Err(e) if attempt < options.connect_retry => {
                    attempt += 1;
                    let backoff = backoff(attempt);
                    warn!(attempt, error = %e, ?backoff, "Redis connection failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    return Err(Error::Unavailable {
                        tier: "L2",
                        operation: "connect",
                        reason: e.to_string(),
                    })
                }
            }
        }
    }

    fn key(&self, key: &str) -> String {
        prefixed(&self.instance_name, key)
    }

    fn conn(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

fn prefixed(instance_name: &str, key: &str) -> String {
    format!("{}{}", instance_name, key)
}

fn unprefixed(instance_name: &str, key: String) -> String {
    match key.strip_prefix(instance_name) {
        Some(rest) => rest.to_string(),
        None => key,
    }
}

/// Translate a glob over unprefixed keys into a Redis `MATCH` pattern.
///
/// The instance name is matched literally. The bracket escapes produced by
/// `glob::Pattern::escape` become backslash escapes, and `[!..]` becomes
/// `[^..]`.
fn scan_match(instance_name: &str, pattern: &str) -> String {
    let mut out = String::with_capacity(instance_name.len() + pattern.len());
    for c in instance_name.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }

    let mut rest = pattern;
    while let Some(c) = rest.chars().next() {
        if let Some(literal) = ["[[]", "[]]", "[*]", "[?]"]
            .iter()
            .find(|seq| rest.starts_with(**seq))
        {
            out.push('\\');
            out.push_str(&literal[1..2]);
            rest = &rest[3..];
        } else if let Some(tail) = rest.strip_prefix("[!") {
            out.push_str("[^");
            rest = tail;
        } else {
            if c == '\\' {
                out.push('\\');
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// Connection-level failures are transient; everything else is not
fn classify(operation: &'static str) -> impl Fn(RedisError) -> Error {
    move |e| {
        if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
            Error::unavailable(operation, e.to_string())
        } else {
            Error::Redis(e)
        }
    }
}

/// Exponential connect backoff, capped at `MAX_BACKOFF_MS`
fn backoff(attempt: u32) -> Duration {
    let ms = 2u64
        .checked_pow(attempt)
        .and_then(|factor| factor.checked_mul(BASE_BACKOFF_MS))
        .map_or(MAX_BACKOFF_MS, |ms| ms.min(MAX_BACKOFF_MS));
    Duration::from_millis(ms)
}

fn millis(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

#[async_trait]
impl DistributedStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::ALL
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Bytes>> {
        let key = self.key(key);
        let mut conn = self.conn();

        let (data, sliding): (Option<Vec<u8>>, Option<i64>) = redis::pipe()
            .hget(&key, DATA_FIELD)
            .hget(&key, SLIDING_FIELD)
            .query_async(&mut conn)
            .await
            .map_err(classify("get"))?;

        if let (Some(_), Some(window_ms)) = (&data, sliding) {
            let _: bool = conn
                .pexpire(&key, window_ms)
                .await
                .map_err(classify("get"))?;
        }
        Ok(data.map(Bytes::from))
    }

    async fn set_bytes(&self, key: &str, value: Bytes, expiration: &Expiration) -> Result<()> {
        let key = self.key(key);
        let mut conn = self.conn();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(&key)
            .ignore()
            .hset(&key, DATA_FIELD, value.as_ref())
            .ignore();
        if let Expiration::Sliding(window) = expiration {
            pipe.hset(&key, SLIDING_FIELD, millis(*window)).ignore();
        }
        if let Some(window) = expiration.window() {
            pipe.pexpire(&key, millis(window)).ignore();
        }

        let _: () = pipe.query_async(&mut conn).await.map_err(classify("set"))?;
        Ok(())
    }

    async fn remove_bytes(&self, key: &str) -> Result<bool> {
        let removed: i64 = self
            .conn()
            .del(self.key(key))
            .await
            .map_err(classify("remove"))?;
        Ok(removed > 0)
    }

    async fn refresh_ttl(&self, key: &str) -> Result<()> {
        let key = self.key(key);
        let mut conn = self.conn();

        let sliding: Option<i64> = conn
            .hget(&key, SLIDING_FIELD)
            .await
            .map_err(classify("refresh"))?;
        if let Some(window_ms) = sliding {
            let _: bool = conn
                .pexpire(&key, window_ms)
                .await
                .map_err(classify("refresh"))?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.conn()
            .exists(self.key(key))
            .await
            .map_err(classify("exists"))
    }

    async fn enumerate_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let scan_pattern = scan_match(&self.instance_name, pattern);
        let mut conn = self.conn();
        let mut keys = Vec::new();
        let mut cursor = 0u64;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&scan_pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(classify("enumerate_keys"))?;

            // SCAN MATCH only narrows; the glob decides
            keys.extend(
                batch
                    .into_iter()
                    .map(|key| unprefixed(&self.instance_name, key))
                    .filter(|key| matcher.matches(key)),
            );
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn atomic_increment(&self, key: &str, delta: i64) -> Result<i64> {
        self.conn()
            .hincr(self.key(key), DATA_FIELD, delta)
            .await
            .map_err(|e| match e.kind() {
                redis::ErrorKind::ResponseError => Error::NotANumber {
                    key: key.to_string(),
                },
                _ => classify("increment")(e),
            })
    }

    async fn atomic_increment_f64(&self, key: &str, delta: f64) -> Result<f64> {
        self.conn()
            .hincr(self.key(key), DATA_FIELD, delta)
            .await
            .map_err(|e| match e.kind() {
                redis::ErrorKind::ResponseError => Error::NotANumber {
                    key: key.to_string(),
                },
                _ => classify("increment_f64")(e),
            })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let key = self.key(key);
        let mut conn = self.conn();

        let (applied,): (bool,) = redis::pipe()
            .atomic()
            .hdel(&key, SLIDING_FIELD)
            .ignore()
            .pexpire(&key, millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(classify("expire"))?;
        Ok(applied)
    }
}
