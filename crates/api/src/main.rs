use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noise_api::background;
use noise_api::config::{LogFormat, ServerConfig};
use noise_api::router::build_app_router;
use noise_api::state::AppState;
use noise_core::clock::system_clock;
use noise_events::EventLogger;
use noise_worker::{CommandEngine, WorkerPool};

const DEFAULT_LOG_FILTER: &str =
    "noise_api=debug,noise_worker=debug,noise_store=info,noise_events=info,tower_http=debug";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match LogFormat::from_env() {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    let orchestration = Arc::clone(&config.orchestration);
    tracing::info!(
        host = %config.host,
        port = %config.port,
        engine = %config.engine_command,
        workers = orchestration.worker_concurrency,
        queue_capacity = orchestration.queue_capacity,
        "Loaded server configuration"
    );

    // --- Registry, cache, queue, dispatcher ---
    let (state, consumer) = AppState::new(Arc::clone(&config), system_clock());
    let registry = Arc::clone(&state.registry);

    // --- Workers ---
    let engine = Arc::new(CommandEngine::new(
        config.engine_command.clone(),
        config.engine_args.clone(),
    ));
    let pool = WorkerPool::spawn(consumer, Arc::clone(&registry), engine, Arc::clone(&orchestration));
    tracing::info!(workers = pool.size(), "Worker pool started");

    // --- Background tasks ---
    let background_cancel = CancellationToken::new();
    let logger_handle = tokio::spawn(EventLogger::run(
        state.event_bus.subscribe(),
        background_cancel.clone(),
    ));
    let retention_handle = tokio::spawn(background::retention::run(
        Arc::clone(&registry),
        orchestration.sweep_interval,
        background_cancel.clone(),
    ));
    let reaper_handle = tokio::spawn(background::lease_reaper::run(
        Arc::clone(&registry),
        orchestration.heartbeat_interval,
        background_cancel.clone(),
    ));
    tracing::info!("Background tasks started (event logger, retention sweep, lease reaper)");

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = match config.host.parse::<std::net::IpAddr>() {
        Ok(host) => host,
        Err(e) => {
            tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
            std::process::exit(1);
        }
    };
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Workers still busy after the grace period are aborted, which kills
    // their engine processes.
    pool.shutdown(Duration::from_secs(config.shutdown_timeout_secs)).await;

    background_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), reaper_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
