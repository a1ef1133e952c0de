//! Authentication service.
//!
//! Password accounts only. Every account is created together with the claim
//! of the tag that was scanned to reach the registration form.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use chrono::Utc;
use sha2::Sha256;
use sqlx::SqlitePool;

use tagcard_core::{Email, Shortid};

use crate::db::users::{self, UserRepository};
use crate::db::{RepositoryError, profiles, tags};
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Prefix of passlib `pbkdf2_sha256` hashes written by the earlier deployment.
const LEGACY_PBKDF2_PREFIX: &str = "$pbkdf2-sha256$";

/// Registration input as submitted by the form.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'r> {
    pub email: &'r str,
    pub password: &'r str,
    pub name: Option<&'r str>,
    pub pending_shortid: &'r str,
}

/// Authentication service.
pub struct AuthService<'a> {
    pool: &'a SqlitePool,
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user and claim their pending tag in one transaction.
    ///
    /// Either both the account and the claim are committed or neither is.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` / `WeakPassword` for bad input,
    /// `MissingPendingTag` / `TagNotFound` when there is no tag to claim,
    /// `UserAlreadyExists` for a taken email and `TagAlreadyClaimed` when
    /// the tag already has an owner.
    pub async fn register(&self, input: Registration<'_>) -> Result<(User, Shortid), AuthError> {
        let email = Email::normalize(input.email)?;
        validate_password(input.password)?;

        let pending = input.pending_shortid.trim();
        if pending.is_empty() {
            return Err(AuthError::MissingPendingTag);
        }
        let shortid = Shortid::parse(pending).map_err(|_| AuthError::TagNotFound)?;

        let name = input.name.map(str::trim).filter(|n| !n.is_empty());
        let password_hash = hash_password(input.password)?;
        let now = Utc::now();

        // The user insert comes first so the transaction holds the write
        // lock before the tag is read.
        let mut tx = self.pool.begin().await?;

        let user = users::insert(&mut tx, &email, &password_hash, name, now)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        let tag = tags::find_by_shortid(&mut tx, &shortid)
            .await?
            .ok_or(AuthError::TagNotFound)?;

        if !tags::claim(&mut tx, tag.id, user.id).await? {
            return Err(AuthError::TagAlreadyClaimed);
        }

        profiles::ensure(&mut tx, tag.id, now).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, shortid = %shortid, "User registered and claimed tag");
        Ok((user, shortid))
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or
    /// malformed, or the password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::normalize(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if needs_rehash(&password_hash) {
            self.upgrade_hash(&user, password).await;
        }

        Ok(user)
    }

    /// Store an Argon2id hash in place of a legacy one.
    ///
    /// Failures are logged; the login itself already succeeded.
    async fn upgrade_hash(&self, user: &User, password: &str) {
        let result = match hash_password(password) {
            Ok(hash) => self
                .users
                .update_password_hash(user.id, &hash)
                .await
                .map_err(AuthError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => tracing::info!(user_id = %user.id, "Upgraded legacy password hash"),
            Err(e) => tracing::warn!(user_id = %user.id, error = %e, "Password rehash failed"),
        }
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Whether a stored hash predates Argon2id and should be replaced.
#[must_use]
pub fn needs_rehash(hash: &str) -> bool {
    hash.starts_with(LEGACY_PBKDF2_PREFIX)
}

/// Verify a password against a hash.
///
/// Accepts Argon2 PHC strings and passlib `pbkdf2_sha256` hashes.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on mismatch or an unreadable hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    if let Some(rest) = hash.strip_prefix(LEGACY_PBKDF2_PREFIX) {
        return verify_legacy_pbkdf2(password, rest);
    }

    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Verify `rounds$salt$checksum`, both parts in passlib's adapted base64
/// (`.` instead of `+`, no padding).
fn verify_legacy_pbkdf2(password: &str, encoded: &str) -> Result<(), AuthError> {
    let mut parts = encoded.split('$');
    let (Some(rounds), Some(salt), Some(checksum), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidCredentials);
    };

    let rounds: u32 = rounds.parse().map_err(|_| AuthError::InvalidCredentials)?;
    let salt = decode_ab64(salt)?;
    let expected = decode_ab64(checksum)?;
    if rounds == 0 || expected.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }

    let mut derived = vec![0u8; expected.len()];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut derived);

    let diff = derived
        .iter()
        .zip(&expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    if diff == 0 {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

fn decode_ab64(value: &str) -> Result<Vec<u8>, AuthError> {
    STANDARD_NO_PAD
        .decode(value.replace('.', "+"))
        .map_err(|_| AuthError::InvalidCredentials)
}
