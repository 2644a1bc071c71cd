//! Health Checks
//!
//! Liveness and readiness checks for the cache service. Readiness pings the
//! distributed tier; an unreachable L2 reports `Degraded` rather than
//! `Unhealthy` because reads fall back to L1 and misses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cache::{Backing, TieredCache};

/// Health status, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Serving, but the distributed tier is not
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Whether the service can take traffic
    pub fn is_operational(&self) -> bool {
        *self != HealthStatus::Unhealthy
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Outcome of checking one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub component: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn new(component: impl Into<String>, status: HealthStatus, detail: Option<String>) -> Self {
        Self {
            component: component.into(),
            status,
            detail,
            latency_ms: None,
        }
    }

    pub fn healthy(component: impl Into<String>) -> Self {
        Self::new(component, HealthStatus::Healthy, None)
    }

    pub fn degraded(component: impl Into<String>, detail: impl ToString) -> Self {
        Self::new(component, HealthStatus::Degraded, Some(detail.to_string()))
    }

    pub fn unhealthy(component: impl Into<String>, detail: impl ToString) -> Self {
        Self::new(component, HealthStatus::Unhealthy, Some(detail.to_string()))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = Some(latency.as_millis() as u64);
        self
    }
}

/// Body of a health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst component status
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub version: String,
    pub uptime_seconds: u64,
}

impl HealthResponse {
    pub fn new(components: Vec<ComponentHealth>, uptime: Duration) -> Self {
        let status = components
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        Self {
            status,
            components,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime.as_secs(),
        }
    }
}

/// Process-level health state. Starts not ready.
pub struct HealthCheck {
    started: Instant,
    ready: AtomicBool,
}

impl HealthCheck {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// The process is up and answering
    pub fn liveness(&self) -> HealthResponse {
        HealthResponse::new(
            vec![ComponentHealth::healthy("process")],
            self.started.elapsed(),
        )
    }

    /// Startup has finished and the distributed tier answers a ping
    pub async fn readiness(&self, cache: &TieredCache) -> HealthResponse {
        let startup = if self.is_ready() {
            ComponentHealth::healthy("startup")
        } else {
            ComponentHealth::unhealthy("startup", "still starting")
        };

        HealthResponse::new(vec![startup, check_l2(cache).await], self.started.elapsed())
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self::new()
    }
}

async fn check_l2(cache: &TieredCache) -> ComponentHealth {
    let component = match cache.backing() {
        Backing::LocalOnly => return ComponentHealth::healthy("l2:none"),
        Backing::Tiered(store) => format!("l2:{}", store.name()),
    };

    match cache.ping().await {
        Ok(latency) => ComponentHealth::healthy(component).with_latency(latency),
        Err(e) => ComponentHealth::degraded(component, e),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DistributedStore, Expiration, StoreCapabilities};
    use crate::config::CacheOptions;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;

    struct DownStore;

    #[async_trait]
    impl DistributedStore for DownStore {
        fn name(&self) -> &'static str {
            "down"
        }

        fn capabilities(&self) -> StoreCapabilities {
            StoreCapabilities::NONE
        }

        async fn get_bytes(&self, _key: &str) -> Result<Option<Bytes>> {
            Err(Error::unavailable("get", "connection refused"))
        }

        async fn set_bytes(&self, _key: &str, _value: Bytes, _exp: &Expiration) -> Result<()> {
            Err(Error::unavailable("set", "connection refused"))
        }

        async fn remove_bytes(&self, _key: &str) -> Result<bool> {
            Err(Error::unavailable("remove", "connection refused"))
        }

        async fn refresh_ttl(&self, _key: &str) -> Result<()> {
            Err(Error::unavailable("refresh", "connection refused"))
        }
    }

    #[test]
    fn test_status_ordering() {
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Unhealthy);
        assert!(HealthStatus::Degraded.is_operational());
        assert!(!HealthStatus::Unhealthy.is_operational());
        assert_eq!(HealthStatus::Degraded.to_string(), "degraded");
    }

    #[test]
    fn test_response_takes_worst_status() {
        let response = HealthResponse::new(
            vec![
                ComponentHealth::healthy("a"),
                ComponentHealth::degraded("b", "slow"),
            ],
            Duration::from_secs(60),
        );

        assert_eq!(response.status, HealthStatus::Degraded);
        assert_eq!(response.uptime_seconds, 60);
    }

    #[tokio::test]
    async fn test_readiness_local_only() {
        let health = HealthCheck::new();
        let cache = TieredCache::local_only(CacheOptions::default());

        assert_eq!(health.readiness(&cache).await.status, HealthStatus::Unhealthy);

        health.set_ready(true);
        assert_eq!(health.readiness(&cache).await.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_readiness_degraded_when_l2_down() {
        let health = HealthCheck::new();
        health.set_ready(true);
        let cache = TieredCache::new(
            CacheOptions::default(),
            Backing::Tiered(Arc::new(DownStore)),
        );

        let response = health.readiness(&cache).await;
        assert_eq!(response.status, HealthStatus::Degraded);
        assert_eq!(response.components[1].component, "l2:down");
        assert!(response.components[1].detail.is_some());
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&ComponentHealth::healthy("l2:memory")).unwrap();
        assert_eq!(json, r#"{"component":"l2:memory","status":"healthy"}"#);

        let parsed: ComponentHealth = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, HealthStatus::Healthy);
        assert!(parsed.latency_ms.is_none());
    }
}
