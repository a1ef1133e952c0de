//! Tag lifecycle: lookup, claim, ownership checks and public views.
//!
//! A tag moves from unclaimed to claimed exactly once. There is no way back.

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;

use tagcard_core::{Shortid, UserId};

use crate::db::RepositoryError;
use crate::db::clicks::ClickRepository;
use crate::db::profiles::{self, ProfileRepository};
use crate::db::tags::{self, TagRepository};
use crate::models::{Profile, Tag};

/// Errors from tag operations.
#[derive(Debug, Error)]
pub enum TagError {
    /// No tag with this shortid (including shortids that cannot exist).
    #[error("tag not found")]
    NotFound,

    /// Another user owns the tag.
    #[error("tag already claimed by another user")]
    ClaimedByOther,

    /// The caller does not own the tag.
    #[error("not the owner of this tag")]
    Forbidden,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Image storage failed.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for TagError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Result of a successful claim request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This request took ownership.
    Claimed,
    /// The requester already owned the tag; nothing changed.
    AlreadyOwned,
}

/// What a visitor scanning a tag should see.
#[derive(Debug)]
pub enum PublicView {
    /// Nobody owns the tag yet; send the visitor to the claim landing page.
    Unclaimed,
    /// The owner's card. `None` when the profile row is missing.
    Card(Box<Tag>, Option<Profile>),
}

/// Request metadata recorded with a click.
#[derive(Debug, Clone, Default)]
pub struct Visitor {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Tag service.
pub struct TagService<'a> {
    pool: &'a SqlitePool,
    tags: TagRepository<'a>,
    profiles: ProfileRepository<'a>,
    clicks: ClickRepository<'a>,
}

impl<'a> TagService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            pool,
            tags: TagRepository::new(pool),
            profiles: ProfileRepository::new(pool),
            clicks: ClickRepository::new(pool),
        }
    }

    /// Look up a tag from a raw path segment.
    ///
    /// # Errors
    ///
    /// Returns `TagError::NotFound` for unknown or malformed shortids.
    pub async fn find(&self, raw_shortid: &str) -> Result<Tag, TagError> {
        let shortid = Shortid::parse(raw_shortid).map_err(|_| TagError::NotFound)?;
        self.tags
            .get_by_shortid(&shortid)
            .await?
            .ok_or(TagError::NotFound)
    }

    /// Look up a tag the caller must own.
    ///
    /// # Errors
    ///
    /// Returns `TagError::NotFound` or `TagError::Forbidden`.
    pub async fn find_owned(&self, raw_shortid: &str, user_id: UserId) -> Result<Tag, TagError> {
        let tag = self.find(raw_shortid).await?;
        if tag.is_owned_by(user_id) {
            Ok(tag)
        } else {
            Err(TagError::Forbidden)
        }
    }

    /// Claim an unowned tag for `user_id`.
    ///
    /// The ownership write and the profile creation commit together.
    ///
    /// # Errors
    ///
    /// Returns `TagError::NotFound` for unknown tags and
    /// `TagError::ClaimedByOther` if someone else owns it.
    pub async fn claim(&self, raw_shortid: &str, user_id: UserId) -> Result<ClaimOutcome, TagError> {
        let tag = self.find(raw_shortid).await?;
        if tag.is_owned_by(user_id) {
            return Ok(ClaimOutcome::AlreadyOwned);
        }

        let mut tx = self.pool.begin().await?;
        if tags::claim(&mut tx, tag.id, user_id).await? {
            profiles::ensure(&mut tx, tag.id, Utc::now()).await?;
            tx.commit().await?;
            tracing::info!(shortid = %tag.shortid, user_id = %user_id, "Tag claimed");
            return Ok(ClaimOutcome::Claimed);
        }

        // Lost the race or the tag was already owned; report who holds it.
        let current = tags::find_by_shortid(&mut tx, &tag.shortid)
            .await?
            .ok_or(TagError::NotFound)?;
        tx.rollback().await?;

        if current.is_owned_by(user_id) {
            Ok(ClaimOutcome::AlreadyOwned)
        } else {
            Err(TagError::ClaimedByOther)
        }
    }

    /// Resolve a public scan and record the click.
    ///
    /// Click logging never fails the view; errors are logged at WARN.
    ///
    /// # Errors
    ///
    /// Returns `TagError::NotFound` for unknown tags.
    pub async fn public_view(&self, raw_shortid: &str, visitor: &Visitor) -> Result<PublicView, TagError> {
        let tag = self.find(raw_shortid).await?;
        if !tag.is_claimed() {
            return Ok(PublicView::Unclaimed);
        }

        let profile = self.profiles.get_by_tag(tag.id).await?;

        if let Err(e) = self
            .clicks
            .record(
                tag.id,
                visitor.ip.as_deref(),
                visitor.user_agent.as_deref(),
                Utc::now(),
            )
            .await
        {
            tracing::warn!(shortid = %tag.shortid, error = %e, "Failed to record click");
        }

        Ok(PublicView::Card(Box::new(tag), profile))
    }

    /// The stored profile for a tag, if any.
    ///
    /// # Errors
    ///
    /// Returns `TagError::Repository` if the query fails.
    pub async fn profile(&self, tag: &Tag) -> Result<Option<Profile>, TagError> {
        Ok(self.profiles.get_by_tag(tag.id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tagcard_core::Email;

    use super::*;
    use crate::db::test_support;
    use crate::db::users::UserRepository;

    async fn user(pool: &SqlitePool, email: &str) -> UserId {
        UserRepository::new(pool)
            .create(&Email::parse(email).unwrap(), "h", None)
            .await
            .unwrap()
            .id
    }

    async fn tag(pool: &SqlitePool, shortid: &str) {
        TagRepository::new(pool)
            .insert(&Shortid::parse(shortid).unwrap(), None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_claim_lifecycle() {
        let (pool, _dir) = test_support::pool().await;
        let u = user(&pool, "u@example.com").await;
        let v = user(&pool, "v@example.com").await;
        tag(&pool, "life0001").await;
        let service = TagService::new(&pool);

        assert_eq!(
            service.claim("life0001", u).await.unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            service.claim("life0001", u).await.unwrap(),
            ClaimOutcome::AlreadyOwned
        );
        assert!(matches!(
            service.claim("life0001", v).await,
            Err(TagError::ClaimedByOther)
        ));

        let stored = service.find("life0001").await.unwrap();
        assert_eq!(stored.owner_user_id, Some(u));
        assert!(service.profile(&stored).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let (pool, _dir) = test_support::pool().await;
        tag(&pool, "race0001").await;
        let mut users = Vec::new();
        for i in 0..6 {
            users.push(user(&pool, &format!("racer{i}@example.com")).await);
        }

        let mut handles = Vec::new();
        for id in users.clone() {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                TagService::new(&pool).claim("race0001", id).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(ClaimOutcome::Claimed) => winners += 1,
                Err(TagError::ClaimedByOther) => {}
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(winners, 1);

        let owner = TagService::new(&pool)
            .find("race0001")
            .await
            .unwrap()
            .owner_user_id
            .unwrap();
        assert!(users.contains(&owner));
    }

    #[tokio::test]
    async fn test_public_view_records_clicks() {
        let (pool, _dir) = test_support::pool().await;
        let u = user(&pool, "u@example.com").await;
        tag(&pool, "view0001").await;
        let service = TagService::new(&pool);
        let visitor = Visitor {
            ip: Some("203.0.113.9".into()),
            user_agent: Some("test-agent".into()),
        };

        assert!(matches!(
            service.public_view("view0001", &visitor).await.unwrap(),
            PublicView::Unclaimed
        ));

        service.claim("view0001", u).await.unwrap();
        assert!(matches!(
            service.public_view("view0001", &visitor).await.unwrap(),
            PublicView::Card(_, Some(_))
        ));

        let stored = service.find("view0001").await.unwrap();
        let clicks = ClickRepository::new(&pool)
            .total_for_tag(stored.id)
            .await
            .unwrap();
        assert_eq!(clicks, 1);
    }

    #[tokio::test]
    async fn test_find_rejects_unknown_and_malformed() {
        let (pool, _dir) = test_support::pool().await;
        let service = TagService::new(&pool);
        assert!(matches!(service.find("nope0000").await, Err(TagError::NotFound)));
        assert!(matches!(service.find("../../etc").await, Err(TagError::NotFound)));
    }

    #[tokio::test]
    async fn test_find_owned() {
        let (pool, _dir) = test_support::pool().await;
        let u = user(&pool, "u@example.com").await;
        let v = user(&pool, "v@example.com").await;
        tag(&pool, "own00001").await;
        let service = TagService::new(&pool);
        service.claim("own00001", u).await.unwrap();

        assert!(service.find_owned("own00001", u).await.is_ok());
        assert!(matches!(
            service.find_owned("own00001", v).await,
            Err(TagError::Forbidden)
        ));
    }
}
