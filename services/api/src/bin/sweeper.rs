//! services/api/src/bin/sweeper.rs
//!
//! One-shot retention cleanup: deletes expired documents and their backing
//! files. Intended to run on a schedule (cron or similar). Pass `--dry-run`
//! to report what would be deleted without touching anything.

use api_lib::{adapters::db::DbAdapter, config::Config, error::ApiError, retention::purge_expired};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let dry_run = std::env::args().any(|arg| arg == "--dry-run");

    let db_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    let db = DbAdapter::new(db_pool);

    let report = purge_expired(&db, &config.upload_dir, dry_run).await?;
    info!(
        examined = report.examined,
        deleted = report.deleted,
        dry_run,
        "retention sweep complete"
    );
    Ok(())
}
