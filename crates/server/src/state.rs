//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::TagcardConfig;
use crate::services::session::{SessionKeyError, SessionSigner};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: TagcardConfig,
    pool: SqlitePool,
    signer: SessionSigner,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the session signing key is unusable.
    pub fn new(config: TagcardConfig, pool: SqlitePool) -> Result<Self, SessionKeyError> {
        let signer = SessionSigner::new(&config.secret_key)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                signer,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &TagcardConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Signs and validates session cookies.
    #[must_use]
    pub fn signer(&self) -> &SessionSigner {
        &self.inner.signer
    }
}
