//! Error types for the tiered cache
//!
//! These errors live at the tier-adapter and codec boundary. The engine's
//! public surface never returns them: it logs and degrades to a miss or a
//! no-op instead.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur inside the cache subsystem
#[derive(Error, Debug)]
pub enum Error {
    /// Backing tier could not be reached or rejected the call
    #[error("{tier} unavailable during {operation}: {reason}")]
    Unavailable {
        tier: &'static str,
        operation: &'static str,
        reason: String,
    },

    /// Tier call exceeded the configured operation timeout
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Caller cancelled the in-flight tier call
    #[error("{operation} cancelled by caller")]
    Cancelled { operation: &'static str },

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression failed
    #[error("Compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("Decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },

    /// Backing store does not offer the requested capability
    #[error("Capability not supported by {store}: {capability}")]
    Unsupported {
        store: &'static str,
        capability: &'static str,
    },

    /// Stored value is not a number and cannot be incremented
    #[error("Value at key {key} is not a number")]
    NotANumber { key: String },

    /// Increment would overflow the stored counter
    #[error("Counter at key {key} would overflow")]
    Overflow { key: String },

    /// Key pattern is not a valid glob
    #[error("Invalid key pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Redis client error
    #[cfg(feature = "redis-backend")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl Error {
    /// Shorthand for an L2 connectivity failure
    pub fn unavailable(operation: &'static str, reason: impl Into<String>) -> Self {
        Error::Unavailable {
            tier: "L2",
            operation,
            reason: reason.into(),
        }
    }

    /// True for failures caused by the transport rather than the data
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Unavailable { .. } | Error::Timeout { .. } | Error::Cancelled { .. }
        )
    }
}
