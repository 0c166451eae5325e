use anyhow::Context;
use dotenvy::dotenv;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

use taskflow::api;
use taskflow::app_state::AppState;
use taskflow::config::Config;
use taskflow::db::pool::{get_db_pool, run_migrations};
use taskflow::db::PgStore;
use taskflow::logging;
use taskflow::utils::notification::NotificationEnqueuer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Config::from_env().context("invalid configuration")?;

    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    let _log_guard = logging::init(config.log_dir.as_deref());

    let pool = get_db_pool(&config)
        .await
        .context("failed to connect to the database")?;
    if config.run_migrations {
        run_migrations(&pool).await.context("failed to run migrations")?;
        tracing::info!("migrations applied");
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(Arc::new(PgStore::new(pool.clone())), config)
        .context("failed to configure delivery channels")?;
    let enqueuer = state.enqueuer.clone();
    let app = api::router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    drain(enqueuer, pool).await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received Ctrl+C, shutting down");
}

async fn drain(enqueuer: NotificationEnqueuer, pool: PgPool) {
    let pending = enqueuer.in_flight();
    if pending > 0 {
        tracing::info!(pending, "waiting for queued notifications");
    }
    enqueuer.settle().await;
    if enqueuer.failed_count() > 0 {
        tracing::warn!(failed = enqueuer.failed_count(), "some notifications were never queued");
    }

    pool.close().await;
    tracing::info!("database pool closed");
}
