//! Tag inventory commands.

use std::path::Path;

use sqlx::SqlitePool;
use tagcard_core::Shortid;
use tagcard_server::db::tags::TagRepository;
use tagcard_server::services::inventory::{InventoryService, clamp_count, render_csv};

use super::CliError;

/// Provision `count` tags and emit their shortids as CSV.
pub async fn generate(
    pool: &SqlitePool,
    count: i64,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let shortids = InventoryService::new(pool)
        .generate(clamp_count(Some(count)))
        .await?;
    let csv = render_csv(&shortids);

    match output {
        Some(path) => {
            tokio::fs::write(path, csv).await?;
            tracing::info!(count = shortids.len(), path = %path.display(), "CSV written");
        }
        None => {
            #[allow(clippy::print_stdout)]
            {
                print!("{csv}");
            }
        }
    }
    Ok(())
}

/// Import an inventory file.
pub async fn import(pool: &SqlitePool, file: &Path) -> Result<(), CliError> {
    let text = tokio::fs::read_to_string(file).await?;
    let report = InventoryService::new(pool).import(&text).await?;

    tracing::info!(
        created = report.created,
        skipped = report.skipped,
        file = %file.display(),
        "Import finished"
    );
    Ok(())
}

/// Insert one unowned tag.
pub async fn add(
    pool: &SqlitePool,
    shortid: &str,
    site_code: Option<&str>,
    server_code: Option<&str>,
) -> Result<(), CliError> {
    let shortid = Shortid::parse(shortid)?;
    let tag = TagRepository::new(pool)
        .insert(&shortid, site_code, server_code)
        .await?;

    tracing::info!(shortid = %tag.shortid, stable_id = %tag.stable_id, "Tag added");
    Ok(())
}
