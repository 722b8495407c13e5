//! HTTP server initialization and runtime setup.
//!
//! Handles storage setup, background tasks, and the Axum server lifecycle
//! including graceful shutdown.

use crate::config::{Config, StorageBackend};
use crate::domain::click_worker::run_click_worker;
use crate::domain::periodic::PeriodicTask;
use crate::routes::app_router;
use crate::state::{AppState, Repositories};

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long shutdown waits for the click worker to drain the queue.
const CLICK_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Storage (PostgreSQL pool with migrations, or in-memory)
/// - Background click worker
/// - Periodic limiter and session sweeps
/// - Axum HTTP server
///
/// On `SIGINT`/`SIGTERM` the server stops accepting connections and finishes
/// in-flight requests, then the periodic tasks are stopped and the click
/// queue is drained.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let repositories = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool = connect_pool(&config, url).await?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to apply migrations")?;

            Repositories::postgres(Arc::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Repositories::memory()
        }
    };

    let (click_tx, click_rx) = mpsc::channel(config.click_queue_capacity);
    let click_worker = tokio::spawn(run_click_worker(click_rx, repositories.links.clone()));

    let state = AppState::new(&repositories, &config, click_tx);
    let tasks = spawn_maintenance(&state, &config);

    let app = app_router(state);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped, shutting down background tasks");

    for task in tasks {
        let name = task.name();
        task.stop().await;
        tracing::info!(task = name, "Periodic task stopped");
    }

    // The router, and with it every click sender, is gone; the worker exits
    // once the queue is empty.
    match tokio::time::timeout(CLICK_DRAIN_TIMEOUT, click_worker).await {
        Ok(Ok(())) => tracing::info!("Click queue drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "Click worker panicked"),
        Err(_) => tracing::warn!("Click queue not drained in time, pending clicks lost"),
    }

    Ok(())
}

/// Creates the PostgreSQL pool from the `DB_*` pool settings.
pub async fn connect_pool(config: &Config, url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(url)
        .await
        .context("Failed to connect to database")
}

/// Starts the garbage collection tasks: one sweep per limiter and the
/// expired refresh token sweep.
fn spawn_maintenance(state: &AppState, config: &Config) -> Vec<PeriodicTask> {
    let limiter_period = Duration::from_secs(config.rate_limit_sweep_seconds);
    let session_period = Duration::from_secs(config.session_sweep_seconds);

    let mut tasks = Vec::with_capacity(3);

    for (name, limiter) in [
        ("auth-limiter-sweep", state.auth_limiter.clone()),
        ("redirect-limiter-sweep", state.redirect_limiter.clone()),
    ] {
        tasks.push(PeriodicTask::spawn(name, limiter_period, move || {
            let limiter = limiter.clone();
            async move {
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(
                        limiter = limiter.name(),
                        removed,
                        remaining = limiter.tracked_keys(),
                        "Rate limiter swept"
                    );
                }
            }
        }));
    }

    let sessions = state.sessions.clone();
    tasks.push(PeriodicTask::spawn(
        "session-sweep",
        session_period,
        move || {
            let sessions = sessions.clone();
            async move {
                if let Err(e) = sessions.sweep_expired().await {
                    tracing::error!(error = %e, "Session sweep failed");
                }
            }
        },
    ));

    tasks
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
