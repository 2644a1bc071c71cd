//! Prometheus Exporter
//!
//! Renders a [`CacheStatistics`] snapshot in the Prometheus text format. A
//! fresh registry is built per scrape, so the output always matches the
//! snapshot exactly and a statistics reset shows up as a counter reset.

use prometheus::{
    Gauge, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::cache::CacheStatistics;
use crate::error::Result;

/// Content type of the rendered exposition
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

const NAMESPACE: &str = "tiercache";

fn counter(registry: &Registry, name: &str, help: &str, value: u64) -> Result<()> {
    let c = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    c.inc_by(value);
    registry.register(Box::new(c))?;
    Ok(())
}

/// Render statistics as Prometheus text exposition
pub fn render_prometheus(stats: &CacheStatistics) -> Result<String> {
    let registry = Registry::new();

    counter(&registry, "hits_total", "Cache hits across both tiers", stats.total_hits)?;
    counter(&registry, "misses_total", "Cache misses", stats.total_misses)?;
    counter(&registry, "sets_total", "Cache writes", stats.total_sets)?;
    counter(&registry, "removes_total", "Cache removals", stats.total_removes)?;

    let tier_hits = IntCounterVec::new(
        Opts::new("tier_hits_total", "Hits by serving tier").namespace(NAMESPACE),
        &["tier"],
    )?;
    tier_hits.with_label_values(&["l1"]).inc_by(stats.l1_hits);
    tier_hits.with_label_values(&["l2"]).inc_by(stats.l2_hits);
    registry.register(Box::new(tier_hits))?;

    let hit_rate = Gauge::with_opts(
        Opts::new("hit_rate_percent", "Hit rate as a percentage").namespace(NAMESPACE),
    )?;
    hit_rate.set(stats.hit_rate);
    registry.register(Box::new(hit_rate))?;

    let size = IntGauge::with_opts(
        Opts::new("size_bytes", "Last written size summed over live keys").namespace(NAMESPACE),
    )?;
    size.set(stats.total_size_bytes);
    registry.register(Box::new(size))?;

    let keys = IntGauge::with_opts(
        Opts::new("tracked_keys", "Keys with recorded activity").namespace(NAMESPACE),
    )?;
    keys.set(stats.key_count as i64);
    registry.register(Box::new(keys))?;

    let latency = Gauge::with_opts(
        Opts::new(
            "l2_read_latency_seconds",
            "Moving average of L2 read latency",
        )
        .namespace(NAMESPACE),
    )?;
    latency.set(stats.l2_read_latency_us as f64 / 1_000_000.0);
    registry.register(Box::new(latency))?;

    let key_requests = IntCounterVec::new(
        Opts::new("key_requests_total", "Requests for the busiest keys").namespace(NAMESPACE),
        &["key", "outcome"],
    )?;
    let key_size = IntGaugeVec::new(
        Opts::new("key_size_bytes", "Last written size of the busiest keys").namespace(NAMESPACE),
        &["key"],
    )?;
    for key in &stats.top_keys {
        key_requests
            .with_label_values(&[key.key.as_str(), "hit"])
            .inc_by(key.hits);
        key_requests
            .with_label_values(&[key.key.as_str(), "miss"])
            .inc_by(key.misses);
        key_size
            .with_label_values(&[key.key.as_str()])
            .set(key.size_bytes as i64);
    }
    registry.register(Box::new(key_requests))?;
    registry.register(Box::new(key_size))?;

    Ok(TextEncoder::new().encode_to_string(&registry.gather())?)
}
