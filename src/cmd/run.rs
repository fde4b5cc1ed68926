//! `traceability run` — start the server.
//!
//! Loads the traceability config from a file (or built-in defaults),
//! builds the middleware chain, starts the Axum HTTP server with
//! graceful shutdown, and spawns a background config refresh loop for
//! hot-reloading.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::config::sources::{self, DefaultSource};
use crate::config::{ConfigResolver, ConfigSource};
use crate::error::TraceabilityError;
use crate::logging;
use crate::middleware::traceability::TraceabilityHandler;
use crate::middleware::MiddlewareHandler;
use crate::server::{self, AppState};

pub async fn execute(args: RunArgs) -> Result<(), TraceabilityError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let resolver = resolve_config_source(args.config.as_deref()).await?;
    let source_name = resolver.primary_name();
    let handler = Arc::new(TraceabilityHandler::load(resolver).await?);
    let enabled = handler.is_enabled();

    let state = Arc::new(AppState::new(handler));

    // Shutdown signal: dropping shutdown_tx closes the channel and stops the refresh loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let refresh_state = state.clone();
    let poll_interval = args.poll_interval;
    let refresh_handle = tokio::spawn(async move {
        config_refresh_loop(refresh_state, poll_interval, shutdown_rx).await;
    });

    let router = server::build_router(state, args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        config_source = source_name,
        enabled,
        "traceability started"
    );

    // Wrap the shutdown signal to also stop the config refresh loop immediately
    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    // Wait for the config refresh task to finish (catches panics)
    if let Err(e) = refresh_handle.await {
        tracing::error!(error = %e, "config refresh task failed");
    }

    tracing::info!("traceability stopped");
    Ok(())
}

/// Pick the config source: an explicit file, an auto-detected file, or
/// the built-in defaults when neither exists.
pub async fn resolve_config_source(
    explicit: Option<&Path>,
) -> Result<ConfigResolver, TraceabilityError> {
    if let Some(path) = explicit {
        return create_file_source(path).map(|source| ConfigResolver::new(source, None));
    }

    let candidates = [
        "traceability.yaml",
        "traceability.yml",
        "traceability.json",
        "traceability.toml",
    ];

    for name in &candidates {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return create_file_source(&path).map(|source| ConfigResolver::new(source, None));
        }
    }

    tracing::info!("no config file found, using defaults");
    Ok(ConfigResolver::new(Box::new(DefaultSource), None))
}

fn create_file_source(path: &Path) -> Result<Box<dyn ConfigSource>, TraceabilityError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Box::new(sources::yaml::new(path.to_path_buf()))),

        #[cfg(feature = "json")]
        "json" => Ok(Box::new(sources::json::new(path.to_path_buf()))),

        #[cfg(feature = "toml")]
        "toml" => Ok(Box::new(sources::toml_source::new(path.to_path_buf()))),

        other => Err(TraceabilityError::UnsupportedFormat(other.to_string())),
    }
}

async fn config_refresh_loop(
    state: Arc<AppState>,
    interval_secs: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("config refresh loop shutting down");
                return;
            }
        }

        match state.traceability.reload_if_changed(&state.registry).await {
            Ok(true) => {
                state.stats.config_reloads.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(error = %e, "config reload failed, keeping current config");
            }
        }
    }
}
