//! Tag repository for database operations.
//!
//! Ownership is only ever written by [`claim`], a single conditional UPDATE
//! that succeeds for exactly one caller per tag.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use tagcard_core::{Shortid, TagId, TagStatus, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::{OwnedTagSummary, Tag};

const TAG_COLUMNS: &str =
    "id, shortid, stable_id, site_code, server_code, owner_user_id, status, created_at";

#[derive(sqlx::FromRow)]
struct TagRow {
    id: TagId,
    shortid: Shortid,
    stable_id: Option<String>,
    site_code: Option<String>,
    server_code: Option<String>,
    owner_user_id: Option<UserId>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TagRow> for Tag {
    type Error = RepositoryError;

    fn try_from(row: TagRow) -> Result<Self, Self::Error> {
        let status: TagStatus = row
            .status
            .parse()
            .map_err(|e| RepositoryError::DataCorruption(format!("tag {}: {e}", row.id)))?;
        let stable_id = row.stable_id.ok_or_else(|| {
            RepositoryError::DataCorruption(format!("tag {} has no stable_id", row.id))
        })?;
        Ok(Self {
            id: row.id,
            shortid: row.shortid,
            stable_id,
            site_code: row.site_code,
            server_code: row.server_code,
            owner_user_id: row.owner_user_id,
            status,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OwnedTagRow {
    shortid: Shortid,
    clicks: i64,
    created_at: DateTime<Utc>,
}

/// Repository for tag database operations.
pub struct TagRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TagRepository<'a> {
    /// Create a new tag repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a tag by its public shortid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_shortid(&self, shortid: &Shortid) -> Result<Option<Tag>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_by_shortid(&mut conn, shortid).await
    }

    /// Provision a new unowned tag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the shortid is already taken.
    pub async fn insert(
        &self,
        shortid: &Shortid,
        site_code: Option<&str>,
        server_code: Option<&str>,
    ) -> Result<Tag, RepositoryError> {
        let stable_id = Uuid::new_v4().simple().to_string();
        let sql = format!(
            "INSERT INTO tag (shortid, stable_id, site_code, server_code, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {TAG_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TagRow>(&sql)
            .bind(shortid)
            .bind(stable_id)
            .bind(site_code)
            .bind(server_code)
            .bind(TagStatus::Unassigned.as_str())
            .bind(Utc::now())
            .fetch_one(self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "shortid"))?;

        Tag::try_from(row)
    }

    /// Tags owned by `owner` with their lifetime click counts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_owned_with_counts(
        &self,
        owner: UserId,
    ) -> Result<Vec<OwnedTagSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OwnedTagRow>(
            r"
            SELECT t.shortid, t.created_at, COUNT(c.id) AS clicks
            FROM tag t
            LEFT JOIN click c ON c.tag_id = t.id
            WHERE t.owner_user_id = ?
            GROUP BY t.id
            ORDER BY t.created_at, t.id
            ",
        )
        .bind(owner)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| OwnedTagSummary {
                shortid: r.shortid,
                clicks: r.clicks,
                created_at: r.created_at,
            })
            .collect())
    }

    /// Unowned tags, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_unassigned(&self) -> Result<Vec<Tag>, RepositoryError> {
        let sql = format!(
            "SELECT {TAG_COLUMNS} FROM tag WHERE owner_user_id IS NULL \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, TagRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Tag::try_from).collect()
    }

    /// The subset of `shortids` that exist, in input order without duplicates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn existing(&self, shortids: &[Shortid]) -> Result<Vec<Shortid>, RepositoryError> {
        if shortids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT shortid FROM tag WHERE shortid IN (");
        let mut separated = builder.separated(", ");
        for shortid in shortids {
            separated.push_bind(shortid.as_str());
        }
        separated.push_unseparated(")");

        let found: HashSet<String> = builder
            .build_query_scalar::<String>()
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .collect();

        let mut seen = HashSet::new();
        Ok(shortids
            .iter()
            .filter(|s| found.contains(s.as_str()) && seen.insert(s.as_str()))
            .cloned()
            .collect())
    }
}

/// Look up a tag on an existing connection or transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_shortid(
    conn: &mut SqliteConnection,
    shortid: &Shortid,
) -> Result<Option<Tag>, RepositoryError> {
    let sql = format!("SELECT {TAG_COLUMNS} FROM tag WHERE shortid = ?");
    let row = sqlx::query_as::<_, TagRow>(&sql)
        .bind(shortid)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Tag::try_from).transpose()
}

/// Set the owner of an unowned tag.
///
/// Returns `true` if this call took ownership, `false` if the tag already had
/// an owner (whoever it is). The guard and the write are one statement, so
/// concurrent callers cannot both succeed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn claim(
    conn: &mut SqliteConnection,
    tag_id: TagId,
    owner: UserId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE tag SET owner_user_id = ?, status = ? WHERE id = ? AND owner_user_id IS NULL",
    )
    .bind(owner)
    .bind(TagStatus::Claimed.as_str())
    .bind(tag_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tagcard_core::Email;

    use super::*;
    use crate::db::test_support;
    use crate::db::users::UserRepository;

    fn sid(s: &str) -> Shortid {
        Shortid::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_stable_id() {
        let (pool, _dir) = test_support::pool().await;
        let tags = TagRepository::new(&pool);

        let tag = tags.insert(&sid("ab12cd34"), Some("IST"), None).await.unwrap();
        assert_eq!(tag.stable_id.len(), 32);
        assert_eq!(tag.status, TagStatus::Unassigned);
        assert_eq!(tag.site_code.as_deref(), Some("IST"));
        assert!(!tag.is_claimed());

        let err = tags.insert(&sid("ab12cd34"), None, None).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_claim_sets_owner_once() {
        let (pool, _dir) = test_support::pool().await;
        let tags = TagRepository::new(&pool);
        let users = UserRepository::new(&pool);
        let u = users
            .create(&Email::parse("u@example.com").unwrap(), "h", None)
            .await
            .unwrap();
        let v = users
            .create(&Email::parse("v@example.com").unwrap(), "h", None)
            .await
            .unwrap();
        let tag = tags.insert(&sid("claimme1"), None, None).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(claim(&mut conn, tag.id, u.id).await.unwrap());
        assert!(!claim(&mut conn, tag.id, v.id).await.unwrap());
        assert!(!claim(&mut conn, tag.id, u.id).await.unwrap());

        let stored = tags.get_by_shortid(&sid("claimme1")).await.unwrap().unwrap();
        assert_eq!(stored.owner_user_id, Some(u.id));
        assert_eq!(stored.status, TagStatus::Claimed);
    }

    #[tokio::test]
    async fn test_existing_filters_and_dedupes() {
        let (pool, _dir) = test_support::pool().await;
        let tags = TagRepository::new(&pool);
        tags.insert(&sid("aaaa1111"), None, None).await.unwrap();
        tags.insert(&sid("bbbb2222"), None, None).await.unwrap();

        let found = tags
            .existing(&[sid("bbbb2222"), sid("zzzz9999"), sid("aaaa1111"), sid("bbbb2222")])
            .await
            .unwrap();
        assert_eq!(found, vec![sid("bbbb2222"), sid("aaaa1111")]);
    }

    #[tokio::test]
    async fn test_unassigned_newest_first() {
        let (pool, _dir) = test_support::pool().await;
        let tags = TagRepository::new(&pool);
        tags.insert(&sid("first001"), None, None).await.unwrap();
        tags.insert(&sid("second02"), None, None).await.unwrap();

        let listed: Vec<String> = tags
            .list_unassigned()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.shortid.into_inner())
            .collect();
        assert_eq!(listed, vec!["second02", "first001"]);
    }
}
