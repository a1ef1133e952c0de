//! Integration test harness for Tagcard.
//!
//! Each [`TestContext`] runs the full router on an ephemeral port against a
//! throwaway `SQLite` file, so tests exercise real HTTP, cookies and
//! redirects.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tagcard-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::path::PathBuf;

use reqwest::{Client, Response, redirect::Policy};
use secrecy::SecretString;
use sqlx::SqlitePool;
use tempfile::TempDir;

use tagcard_core::{Email, Shortid};
use tagcard_server::app;
use tagcard_server::config::TagcardConfig;
use tagcard_server::db::{self, tags::TagRepository};
use tagcard_server::state::AppState;

/// Session secret shared by the server and tests that forge tokens.
pub const TEST_SECRET: &str = "k3Jq9vX2mP7wL4zR8tN6yB1cH5fD0gSa";

/// Password used by [`TestContext::register`].
pub const PASSWORD: &str = "correct horse battery";

/// A running server plus direct database access.
pub struct TestContext {
    pub base_url: String,
    pub pool: SqlitePool,
    pub upload_dir: PathBuf,
    _dir: TempDir,
}

impl TestContext {
    /// Start a server with no admins.
    pub async fn new() -> Self {
        Self::with_admins(&[]).await
    }

    /// Start a server whose admin allow-list is `admins`.
    pub async fn with_admins(admins: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("tagcard.db").display());
        let pool = db::create_pool(&SecretString::from(url.clone()))
            .await
            .unwrap();
        db::init_schema(&pool).await.unwrap();

        let upload_dir = dir.path().join("uploads");
        let mut config = TagcardConfig::for_database(&url, TEST_SECRET, upload_dir.clone());
        config.admin_emails = admins.iter().map(|a| Email::parse(a).unwrap()).collect();
        config.public_base_url = Some("https://tag.example".to_owned());

        let state = AppState::new(config, pool.clone()).unwrap();
        let router = app::router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            pool,
            upload_dir,
            _dir: dir,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A browser-like client: keeps cookies, does not follow redirects.
    #[must_use]
    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .unwrap()
    }

    /// Provision an unowned tag.
    pub async fn seed_tag(&self, shortid: &str) -> Shortid {
        let shortid = Shortid::parse(shortid).unwrap();
        TagRepository::new(&self.pool)
            .insert(&shortid, None, None)
            .await
            .unwrap();
        shortid
    }

    /// Register `email` while claiming `shortid`; the client is signed in afterwards.
    pub async fn register(&self, client: &Client, email: &str, shortid: &str) -> Response {
        client
            .post(self.url("/register"))
            .form(&[
                ("email", email),
                ("password", PASSWORD),
                ("name", ""),
                ("pending_shortid", shortid),
                ("next_url", ""),
            ])
            .send()
            .await
            .unwrap()
    }

    /// Sign in with the given credentials.
    pub async fn login(&self, client: &Client, email: &str, password: &str) -> Response {
        client
            .post(self.url("/login"))
            .form(&[("email", email), ("password", password), ("next_url", "")])
            .send()
            .await
            .unwrap()
    }

    /// A signed-in client that owns a freshly seeded `shortid`.
    pub async fn owner(&self, email: &str, shortid: &str) -> Client {
        self.seed_tag(shortid).await;
        let client = Self::client();
        let response = self.register(&client, email, shortid).await;
        assert_eq!(response.status(), 303, "registration of {email} failed");
        client
    }
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
