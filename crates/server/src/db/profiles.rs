//! Profile repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use tagcard_core::TagId;

use super::RepositoryError;
use crate::models::{Profile, ProfileUpdate};

const PROFILE_COLUMNS: &str = "id, tag_id, full_name, title, description, link, image_url, \
     phone, public_email, instagram, linkedin, facebook, whatsapp, iban, theme_color, updated_at";

/// Repository for profile database operations.
pub struct ProfileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the profile for a tag, if one was created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_tag(&self, tag_id: TagId) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profile WHERE tag_id = ?");
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(tag_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(profile)
    }

    /// The tag's profile, creating an empty one first if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn get_or_create(
        &self,
        tag_id: TagId,
        now: DateTime<Utc>,
    ) -> Result<Profile, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        ensure(&mut conn, tag_id, now).await?;

        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profile WHERE tag_id = ?");
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(tag_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(profile)
    }

    /// Create the profile if missing, then apply `update` to it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either statement fails; nothing
    /// is written in that case.
    pub async fn upsert(
        &self,
        tag_id: TagId,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Profile, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure(&mut tx, tag_id, now).await?;

        let sql = format!(
            r"
            UPDATE profile SET
                full_name = ?, title = ?, description = ?, link = ?,
                phone = ?, public_email = ?, instagram = ?, linkedin = ?,
                facebook = ?, whatsapp = ?, iban = ?,
                theme_color = COALESCE(?, theme_color),
                image_url = COALESCE(?, image_url),
                updated_at = ?
            WHERE tag_id = ?
            RETURNING {PROFILE_COLUMNS}
            "
        );
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(update.full_name.as_deref())
            .bind(update.title.as_deref())
            .bind(update.description.as_deref())
            .bind(update.link.as_deref())
            .bind(update.phone.as_deref())
            .bind(update.public_email.as_deref())
            .bind(update.instagram.as_deref())
            .bind(update.linkedin.as_deref())
            .bind(update.facebook.as_deref())
            .bind(update.whatsapp.as_deref())
            .bind(update.iban.as_deref())
            .bind(update.theme_color.as_deref())
            .bind(update.image_url.as_deref())
            .bind(now)
            .bind(tag_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(profile)
    }
}

/// Create an empty profile for the tag unless one already exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn ensure(
    conn: &mut SqliteConnection,
    tag_id: TagId,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query("INSERT OR IGNORE INTO profile (tag_id, updated_at) VALUES (?, ?)")
        .bind(tag_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
