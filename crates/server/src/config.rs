//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SECRET_KEY` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `TAGCARD_DATABASE_URL` / `DATABASE_URL` - `SQLite` URL (default: `sqlite://tagcard.db`)
//! - `TAGCARD_HOST` - Bind address (default: 127.0.0.1)
//! - `TAGCARD_PORT` - Listen port (default: 8000)
//! - `SESSION_COOKIE_NAME` - Session cookie name (default: session)
//! - `SESSION_MAX_AGE_SECS` - Session lifetime (default: 7 days)
//! - `SESSION_COOKIE_SECURE` - Secure cookie flag (default: true iff `PUBLIC_BASE_URL` is https)
//! - `PUBLIC_BASE_URL` - Absolute base for QR code targets (default: relative URLs)
//! - `ADMIN_EMAILS` - Comma-separated admin allow-list
//! - `SUPPORT_EMAIL` - Contact shown on tag pages
//! - `PURCHASE_URL` - "Buy a tag" link
//! - `UPLOAD_DIR` - Profile image directory (default: uploads)
//! - `MAX_UPLOAD_BYTES` - Edit form body limit (default: 5 MiB)
//! - `TRUSTED_PROXIES` - Comma-separated proxy IPs or CIDRs whose forwarded
//!   headers are believed (default: private and loopback peers)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tagcard_core::Email;
use thiserror::Error;

const MIN_SECRET_KEY_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_DATABASE_URL: &str = "sqlite://tagcard.db";
const DEFAULT_SESSION_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "change-this",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Session cookie settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub max_age: Duration,
    pub secure: bool,
}

/// Tagcard server configuration.
///
/// Built once at startup and handed to `AppState`; nothing reads the
/// environment after this.
#[derive(Clone)]
pub struct TagcardConfig {
    /// `SQLite` connection URL
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Session signing key
    pub secret_key: SecretString,
    pub session: SessionConfig,
    /// Absolute base URL used for QR targets, without trailing slash.
    /// `None` means QR codes encode relative `/t/{shortid}` paths.
    pub public_base_url: Option<String>,
    /// Normalized admin email allow-list
    pub admin_emails: HashSet<Email>,
    pub support_email: String,
    pub purchase_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Proxy IPs or CIDR ranges allowed to set `X-Forwarded-For`.
    /// Empty means private and loopback peers are treated as proxies.
    pub trusted_proxies: Vec<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for TagcardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagcardConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret_key", &"[REDACTED]")
            .field("session", &self.session)
            .field("public_base_url", &self.public_base_url)
            .field("admin_emails", &self.admin_emails)
            .field("support_email", &self.support_email)
            .field("purchase_url", &self.purchase_url)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl TagcardConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the secret key fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("TAGCARD_DATABASE_URL");
        let host = parse_env("TAGCARD_HOST", "127.0.0.1")?;
        let port = parse_env("TAGCARD_PORT", "8000")?;

        let secret_key = get_required_env("SECRET_KEY")?;
        validate_secret_key(&secret_key, "SECRET_KEY")?;

        let public_base_url = get_optional_env("PUBLIC_BASE_URL")
            .map(|raw| normalize_base_url(&raw))
            .transpose()?;
        let secure_default = public_base_url
            .as_deref()
            .is_some_and(|u| u.starts_with("https://"));
        let secure = match get_optional_env("SESSION_COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| ConfigError::InvalidEnvVar("SESSION_COOKIE_SECURE".into(), raw))?,
            None => secure_default,
        };

        let session = SessionConfig {
            cookie_name: get_env_or_default("SESSION_COOKIE_NAME", "session"),
            max_age: Duration::from_secs(parse_env(
                "SESSION_MAX_AGE_SECS",
                &DEFAULT_SESSION_MAX_AGE_SECS.to_string(),
            )?),
            secure,
        };

        let admin_emails = parse_admin_emails(&get_env_or_default("ADMIN_EMAILS", ""))?;
        let trusted_proxies = parse_trusted_proxies(&get_env_or_default("TRUSTED_PROXIES", ""))?;

        Ok(Self {
            database_url,
            host,
            port,
            secret_key,
            session,
            public_base_url,
            admin_emails,
            support_email: get_env_or_default("SUPPORT_EMAIL", "support@example.com"),
            purchase_url: get_env_or_default("PURCHASE_URL", "https://example.com/buy"),
            upload_dir: PathBuf::from(get_env_or_default("UPLOAD_DIR", "uploads")),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string())?,
            trusted_proxies,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration for tests and embedding: no env access, no Sentry.
    #[must_use]
    pub fn for_database(database_url: &str, secret_key: &str, upload_dir: PathBuf) -> Self {
        Self {
            database_url: SecretString::from(database_url.to_owned()),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            secret_key: SecretString::from(secret_key.to_owned()),
            session: SessionConfig {
                cookie_name: "session".to_owned(),
                max_age: Duration::from_secs(DEFAULT_SESSION_MAX_AGE_SECS),
                secure: false,
            },
            public_base_url: None,
            admin_emails: HashSet::new(),
            support_email: "support@example.com".to_owned(),
            purchase_url: "https://example.com/buy".to_owned(),
            upload_dir,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            trusted_proxies: Vec::new(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether `email` is on the admin allow-list.
    #[must_use]
    pub fn is_admin(&self, email: &Email) -> bool {
        self.admin_emails.contains(email)
    }

    /// The URL a tag's QR code points at.
    #[must_use]
    pub fn public_tag_url(&self, shortid: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/t/{shortid}"),
            None => format!("/t/{shortid}"),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable as a secret.
fn get_required_env(key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(key)
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// The database URL alone, for tools that need no other settings.
///
/// Reads `.env` like [`TagcardConfig::from_env`].
#[must_use]
pub fn database_url_from_env() -> SecretString {
    let _ = dotenvy::dotenv();
    get_database_url("TAGCARD_DATABASE_URL")
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> SecretString {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_or_else(
            |_| SecretString::from(DEFAULT_DATABASE_URL),
            SecretString::from,
        )
}

/// Get an optional environment variable; blank counts as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validate `PUBLIC_BASE_URL` and strip any trailing slash.
fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("PUBLIC_BASE_URL".into(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "PUBLIC_BASE_URL".into(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(raw.trim_end_matches('/').to_owned())
}

/// Parse the comma-separated admin list, normalizing each address.
fn parse_admin_emails(raw: &str) -> Result<HashSet<Email>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Email::normalize(s)
                .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_EMAILS".into(), format!("{s}: {e}")))
        })
        .collect()
}

/// Parse the comma-separated proxy list; each entry is an IP or a CIDR.
fn parse_trusted_proxies(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let valid = match entry.split_once('/') {
                Some((network, prefix)) => match (network.parse::<IpAddr>(), prefix.parse::<u8>()) {
                    (Ok(IpAddr::V4(_)), Ok(p)) => p <= 32,
                    (Ok(IpAddr::V6(_)), Ok(p)) => p <= 128,
                    _ => false,
                },
                None => entry.parse::<IpAddr>().is_ok(),
            };
            if valid {
                Ok(entry.to_owned())
            } else {
                Err(ConfigError::InvalidEnvVar(
                    "TRUSTED_PROXIES".into(),
                    format!("'{entry}' is not an IP address or CIDR range"),
                ))
            }
        })
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that the secret key is long, not a placeholder, and has sufficient entropy.
fn validate_secret_key(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_KEY_LENGTH,
                value.len()
            ),
        ));
    }

    let lower = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
