//! Command implementations.

pub mod migrate;
pub mod tags;

use sqlx::SqlitePool;
use tagcard_core::ShortidError;
use tagcard_server::config::database_url_from_env;
use tagcard_server::db::{self, RepositoryError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Could not open the database.
    #[error("Database connection error: {0}")]
    Connect(#[from] sqlx::Error),

    /// A repository call failed.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A shortid given on the command line is malformed.
    #[error("Invalid shortid: {0}")]
    InvalidShortid(#[from] ShortidError),
}

/// Open the configured database and make sure the schema exists.
pub async fn connect() -> Result<SqlitePool, CliError> {
    let pool = db::create_pool(&database_url_from_env()).await?;
    db::init_schema(&pool).await?;
    Ok(pool)
}
