//! Queueline HTTP server.
//!
//! Wires the queue engine over the configured storage backend, exposes the
//! ticket API, serves Prometheus metrics, and shuts down gracefully on
//! SIGINT/SIGTERM.

mod config;

use anyhow::Context;
use config::{Backend, Config};
use metrics_exporter_prometheus::PrometheusBuilder;
use queueline_core::engine::QueueEngine;
use queueline_core::environment::SystemClock;
use queueline_core::memory::InMemoryQueueStore;
use queueline_postgres::PostgresQueueStore;
use queueline_web::{AppState, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; ignore a missing file.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "queueline=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Queueline server");

    let config = Config::from_env().map_err(anyhow::Error::msg)?;
    info!(backend = ?config.backend, "Configuration loaded");

    let metrics_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.metrics_port)
        .parse()
        .context("invalid metrics address")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    queueline_web::metrics::register_queue_metrics();
    info!(address = %metrics_addr, "Metrics exporter listening");

    let engine = build_engine(&config).await?;
    let app = build_router(AppState::new(engine));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

/// Builds the engine over the configured backend and seeds branches.
async fn build_engine(config: &Config) -> anyhow::Result<QueueEngine> {
    let clock = Arc::new(SystemClock);

    match config.backend {
        Backend::Memory => {
            let store = Arc::new(InMemoryQueueStore::new());
            for branch in &config.seed_branches {
                store.register_branch(*branch);
                info!(
                    branch_id = %branch.branch_id,
                    max_capacity = branch.max_capacity,
                    "Seeded branch"
                );
            }
            Ok(QueueEngine::new(
                store.clone(),
                store.clone(),
                store,
                clock,
            ))
        }
        Backend::Postgres => {
            info!("Connecting to postgres");
            let store = Arc::new(
                PostgresQueueStore::connect(&config.postgres.url, config.postgres.max_connections)
                    .await
                    .context("failed to connect to postgres")?,
            );
            for branch in &config.seed_branches {
                store
                    .register_branch(*branch)
                    .await
                    .context("failed to seed branch")?;
                info!(
                    branch_id = %branch.branch_id,
                    max_capacity = branch.max_capacity,
                    "Seeded branch"
                );
            }
            Ok(QueueEngine::new(
                store.clone(),
                store.clone(),
                store,
                clock,
            ))
        }
    }
}

/// Graceful shutdown signal handler.
///
/// Waits for Ctrl+C (SIGINT) or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
