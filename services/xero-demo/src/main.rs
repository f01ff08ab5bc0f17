//! Xero OAuth2 demo backend
//!
//! Single-binary service that:
//! 1. Walks a browser session through Xero's OAuth2 consent flow
//! 2. Keeps the session's tokens and tenant list fresh (refresh, disconnect)
//! 3. Runs demo Accounting API pipelines (invoices, attachments, purchase
//!    orders, quotes) against the active tenant
//! 4. Serves the client build for every other path

mod config;
mod error;
mod fixtures;
mod lifecycle;
mod metrics;
mod pipelines;
mod routes;
mod session;
#[cfg(test)]
mod test_support;
mod view;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xero_auth::XeroClient;

use crate::config::Config;
use crate::fixtures::Fixtures;
use crate::lifecycle::TokenLifecycle;
use crate::metrics::ServiceMetrics;
use crate::routes::RouteSettings;
use crate::session::{MemorySessionStore, SessionStore};

/// How long in-flight requests may run after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How often expired sessions are reclaimed from the in-memory store
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    lifecycle: Arc<TokenLifecycle>,
    sessions: Arc<dyn SessionStore>,
    fixtures: Arc<Fixtures>,
    settings: Arc<RouteSettings>,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Paths outside `/xero`, `/health` and `/metrics` are served from
/// `static_dir`, with `index.html` as the single-page-app fallback.
fn build_router(state: AppState, max_connections: usize, static_dir: &Path) -> Router {
    let client_build =
        ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(routes::xero_routes())
        .fallback_service(client_build)
        .layer(TraceLayer::new_for_http())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside local development
    let dotenv = dotenvy::dotenv();

    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting xero-demo");
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let env = |key: &str| std::env::var(key).ok();
    let config_path = Config::resolve_path(cli_config_path, env);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no configuration file, using defaults and environment"),
    }

    let config = Config::load(config_path.as_deref(), env).context("failed to load configuration")?;

    info!(
        listen_addr = %config.server.listen_addr,
        redirect_uri = %config.xero.redirect_uri,
        scopes = config.xero.scopes.len(),
        static_dir = %config.server.static_dir.display(),
        "configuration loaded"
    );

    let client = XeroClient::new(config.client_config()?).context("failed to build Xero client")?;

    // Fail at startup rather than on the first visit if the authorize URL is unusable
    client
        .build_consent_url("startup-check")
        .context("failed to build consent URL")?;

    let lifecycle = TokenLifecycle::new(client, config.xero.full_org_details);
    let session_ttl = Duration::from_secs(config.session.ttl_secs);
    let metrics = ServiceMetrics::new();
    let sessions = Arc::new(MemorySessionStore::new(session_ttl));
    sessions.clone().spawn_sweeper(SESSION_SWEEP_INTERVAL);

    let app_state = AppState {
        lifecycle: Arc::new(lifecycle),
        sessions,
        fixtures: Arc::new(Fixtures),
        settings: Arc::new(RouteSettings {
            cookie_name: config.session.cookie_name.clone(),
            session_ttl,
            secure_cookie: config.session.secure_cookie,
            attachment_path: config.xero.attachment_path.clone(),
        }),
        metrics,
        prometheus: prometheus_handle,
    };

    let app = build_router(
        app_state,
        config.server.max_connections,
        &config.server.static_dir,
    );

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: notify the server to drain, then race the drain against
    // the timeout.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Liveness JSON: status, uptime, request and error counters, live sessions.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.metrics.started_at.elapsed().as_secs();
    let requests = state.metrics.requests_total.load(Ordering::Relaxed);
    let errors = state.metrics.errors_total.load(Ordering::Relaxed);

    let (status, sessions) = match state.sessions.active_sessions().await {
        Ok(n) => ("healthy", Some(n)),
        Err(e) => {
            warn!(error = %e, "session store unavailable");
            ("degraded", None)
        }
    };

    let body = serde_json::json!({
        "status": status,
        "uptime_seconds": uptime,
        "requests_served": requests,
        "errors_total": errors,
        "active_sessions": sessions,
    });
    let code = if sessions.is_some() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
///
/// If a handler cannot be installed, that signal source is skipped and the
/// other one still applies.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
