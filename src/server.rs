//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the middleware
//! chain, the traceability handler, the module registry, stats, and
//! uptime), [`build_router`] for constructing the Axum router with
//! middleware layers, and [`shutdown_signal`] for SIGTERM / Ctrl+C
//! handling. Every request other than `/health` and `/modules` is run
//! through the chain by [`pipeline_handler`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::echo::EchoHandler;
use crate::health::health_handler;
use crate::middleware::traceability::{TraceabilityHandler, TRACEABILITY_ID};
use crate::middleware::{Chain, Exchange, HttpHandler};
use crate::registry::{ModuleInfo, ModuleRegistry};

#[derive(Debug)]
pub struct Stats {
    pub handled: AtomicU64,
    pub traced: AtomicU64,
    pub failed: AtomicU64,
    pub config_reloads: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handled: AtomicU64::new(0),
            traced: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            config_reloads: AtomicU64::new(0),
        }
    }
}

pub struct AppState {
    pub chain: Chain,
    pub traceability: Arc<TraceabilityHandler>,
    pub registry: ModuleRegistry,
    pub start_time: Instant,
    pub stats: Stats,
}

impl AppState {
    /// Wire the traceability handler in front of the echo terminal and
    /// register every stage with a fresh module registry.
    #[must_use]
    pub fn new(traceability: Arc<TraceabilityHandler>) -> Self {
        let chain = Chain::new(Arc::new(EchoHandler)).with(traceability.clone());
        let registry = ModuleRegistry::new();
        chain.register_all(&registry);
        Self {
            chain,
            traceability,
            registry,
            start_time: Instant::now(),
            stats: Stats::new(),
        }
    }
}

pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/modules", get(modules_handler))
        .fallback(pipeline_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

pub async fn modules_handler(State(state): State<Arc<AppState>>) -> Json<Vec<ModuleInfo>> {
    Json(state.registry.snapshot())
}

/// Run a request through the middleware chain and convert the result back.
pub async fn pipeline_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    // The chain's span is closed by the time a failure is logged here.
    let tid = parts
        .headers
        .get(&TRACEABILITY_ID)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    state.stats.handled.fetch_add(1, Ordering::Relaxed);
    if tid.is_some() {
        state.stats.traced.fetch_add(1, Ordering::Relaxed);
    }

    let mut exchange = Exchange::new(axum::http::Request::from_parts(parts, body));
    match state.chain.handle(&mut exchange).await {
        Ok(()) => exchange.response.map(Body::from),
        Err(e) => {
            tracing::error!(error = %e, tId = tid.as_deref(), "pipeline failed");
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
