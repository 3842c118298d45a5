//! # Regen Seed Worker
//!
//! Processes bulk-seeding jobs enqueued from the admin console
//! (`POST /v1/admin/seed-jobs`): claims pending jobs, inserts sample
//! directory listings and records each job's outcome.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/regen SEED_POLL_INTERVAL_SECS=5 cargo run -p regen-worker
//! ```

use regen_shared::db::pool::{create_pool, DatabaseConfig};
use regen_worker::orchestrator::{OrchestratorConfig, SeedOrchestrator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regen_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Regen Seed Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let config = OrchestratorConfig::from_env()?;

    let db = create_pool(DatabaseConfig {
        max_connections: (config.max_concurrent_jobs as u32) + 2,
        ..DatabaseConfig::from_url(database_url)
    })
    .await?;

    let orchestrator = SeedOrchestrator::new(db, config);
    let shutdown = orchestrator.shutdown_token();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received, stopping seed worker...");
        shutdown.cancel();
    });

    orchestrator.run().await
}
