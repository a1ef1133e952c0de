//! Database operations for the Tagcard `SQLite` store.
//!
//! ## Tables
//!
//! - `"user"` - Accounts (email + argon2 hash)
//! - `tag` - Provisioned NFC tags, optionally owned by a user
//! - `profile` - Public card content, one per tag
//! - `click` - Append-only visit log for analytics
//!
//! # Schema
//!
//! There are no migration files. [`init_schema`] creates missing tables and
//! adds missing columns on every startup; run it by hand with:
//! ```bash
//! cargo run -p tagcard-cli -- migrate
//! ```

pub mod clicks;
pub mod profiles;
mod schema;
pub mod tags;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

pub use schema::init_schema;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-index violation to `Conflict`, everything else to `Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `SQLite` connection pool.
///
/// The database file is created if missing. WAL mode lets readers proceed
/// while a writer holds the lock, and the busy timeout queues concurrent
/// writers instead of failing them.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the file cannot be opened.
pub async fn create_pool(database_url: &SecretString) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}
