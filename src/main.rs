//! tiercache server
//!
//! Runs a [`TieredCache`] and exposes its health and statistics over HTTP.
//!
//! # Endpoints
//!
//! ```text
//! /healthz, /livez   liveness
//! /readyz            readiness (pings the distributed tier)
//! /metrics           Prometheus text exposition
//! /stats             CacheStatistics as JSON
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tiercache::config::{CacheOptions, StoreKind};
use tiercache::monitoring::{self, HealthCheck, HealthResponse, HealthStatus};
use tiercache::TieredCache;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Two-tier cache service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "TIERCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the backing store (memory, distributed, redis)
    #[arg(long, env = "TIERCACHE_STORE")]
    store: Option<StoreKind>,

    /// Override the key prefix
    #[arg(long, env = "TIERCACHE_KEY_PREFIX")]
    key_prefix: Option<String>,

    /// Override the Redis URL
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// HTTP bind address for health and metrics
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn cache_options(&self) -> anyhow::Result<CacheOptions> {
        let mut options = match &self.config {
            Some(path) => CacheOptions::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => CacheOptions::default(),
        };

        if let Some(store) = self.store {
            options.store = store;
        }
        if let Some(prefix) = &self.key_prefix {
            options.key_prefix = prefix.clone();
        }
        if let Some(url) = &self.redis_url {
            options.redis.url = url.clone();
        }

        options.validate().context("invalid cache configuration")?;
        Ok(options)
    }
}

struct AppState {
    cache: TieredCache,
    health: HealthCheck,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let options = args.cache_options()?;
    info!("Starting tiercache");
    info!("  Store: {}", options.store);
    info!("  Key prefix: {}", options.key_prefix);
    info!(
        "  Compression: {} (threshold {} bytes)",
        options.compression_enabled, options.compression_threshold_bytes
    );

    let cache = TieredCache::from_options(options)
        .await
        .context("failed to initialize cache")?;

    let state = Arc::new(AppState {
        cache,
        health: HealthCheck::new(),
    });
    state.health.set_ready(true);

    serve(&args.listen_addr, state).await?;

    info!("tiercache shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "redis=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// HTTP Server
// =============================================================================

type HttpResponse = Response<Full<Bytes>>;

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> hyper::http::Result<HttpResponse> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(body.into()))
}

fn respond_json<T: serde::Serialize>(status: StatusCode, value: &T) -> hyper::http::Result<HttpResponse> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(status, "application/json", body),
        Err(e) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain",
            e.to_string(),
        ),
    }
}

fn health_status_code(response: &HealthResponse) -> StatusCode {
    if response.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn handle(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> hyper::http::Result<HttpResponse> {
    match req.uri().path() {
        "/healthz" | "/livez" => {
            let response = state.health.liveness();
            respond_json(health_status_code(&response), &response)
        }
        "/readyz" => {
            let response = state.health.readiness(&state.cache).await;
            if response.status != HealthStatus::Healthy {
                tracing::warn!(status = %response.status, "Readiness check not healthy");
            }
            respond_json(health_status_code(&response), &response)
        }
        "/metrics" => match monitoring::render_prometheus(&state.cache.statistics()) {
            Ok(text) => respond(StatusCode::OK, monitoring::CONTENT_TYPE, text),
            Err(e) => {
                error!("Failed to render metrics: {}", e);
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    e.to_string(),
                )
            }
        },
        "/stats" => respond_json(StatusCode::OK, &state.cache.statistics()),
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "not found"),
    }
}

async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid listen address: {}", addr))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let (stream, _) = tokio::select! {
            accepted = listener.accept() => accepted.context("accept error")?,
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                state.health.set_ready(false);
                return Ok(());
            }
        };

        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, Arc::clone(&state)));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("HTTP connection error: {}", e);
            }
        });
    }
}
