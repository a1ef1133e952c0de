//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use tagcard_core::{Email, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::User;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    name: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: row.id,
            email,
            name: row.name,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, email, name, created_at FROM "user" WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user and their password hash for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(
            r#"SELECT id, email, name, created_at, password_hash FROM "user" WHERE email = ?"#,
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((User::try_from(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }

    /// Create a user outside of any larger transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    pub async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, email, password_hash, name, Utc::now()).await
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(r#"UPDATE "user" SET password_hash = ? WHERE id = ?"#)
            .bind(password_hash)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

/// Insert a user on an existing connection or transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the email is already registered.
pub async fn insert(
    conn: &mut SqliteConnection,
    email: &Email,
    password_hash: &str,
    name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<User, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO "user" (email, password_hash, name, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, email, name, created_at
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_unique_violation(e, "email"))?;

    User::try_from(row)
}
