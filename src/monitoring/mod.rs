//! Cache Observability
//!
//! Prometheus exposition of cache statistics and liveness/readiness checks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  TieredCache                                             │
//! │     │ statistics()                 │ ping()              │
//! │     ▼                              ▼                     │
//! │  ┌──────────────────┐      ┌───────────────────────┐     │
//! │  │ Exporter         │      │ Health Checks         │     │
//! │  │ (Prometheus text)│      │ (Liveness/Readiness)  │     │
//! │  └──────────────────┘      └───────────────────────┘     │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod exporter;
mod health;

pub use exporter::{render_prometheus, CONTENT_TYPE};
pub use health::{ComponentHealth, HealthCheck, HealthResponse, HealthStatus};
