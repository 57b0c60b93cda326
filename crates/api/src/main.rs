use std::sync::Arc;

use anyhow::Context;

use mailspool_api::app::{self, AppServices};
use mailspool_api::config::Config;
use mailspool_infra::{SmtpMailer, SqliteJobStore, WorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mailspool_observability::init();

    let cfg = Config::from_env()?;

    // An unopenable store is the one fatal startup error.
    let store = Arc::new(
        SqliteJobStore::connect(&cfg.database_url)
            .await
            .context("failed to open job store")?,
    );

    let mailer = Arc::new(SmtpMailer::new(cfg.smtp.clone()));
    let workers = WorkerPool::new(store.clone(), mailer, cfg.pool.clone()).start();

    let services = Arc::new(AppServices::new(store));
    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("stopping workers");
    if tokio::time::timeout(cfg.shutdown_grace, workers.shutdown())
        .await
        .is_err()
    {
        // Abandoned deliveries stay in processing; their outcome is unknown.
        tracing::warn!("workers did not stop within the grace period");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}
