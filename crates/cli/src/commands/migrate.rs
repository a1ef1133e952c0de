//! Schema setup.
//!
//! The schema is created idempotently; the server does the same on startup.
//! This command exists for provisioning a database before first deploy.

use sqlx::SqlitePool;

use super::CliError;

/// Apply the schema (already done by [`super::connect`]) and report table sizes.
pub async fn run(pool: &SqlitePool) -> Result<(), CliError> {
    for table in ["\"user\"", "tag", "profile", "click"] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await?;
        tracing::info!(table, rows = count, "Table ready");
    }
    tracing::info!("Schema up to date");
    Ok(())
}
