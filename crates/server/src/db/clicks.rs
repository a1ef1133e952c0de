//! Click log repository.
//!
//! Clicks are append-only and only ever read back in aggregate. The stored
//! columns keep their original names, `timestamp` and `ua`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use tagcard_core::TagId;

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct DailyCountRow {
    day: String,
    clicks: i64,
}

/// Repository for click database operations.
pub struct ClickRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ClickRepository<'a> {
    /// Create a new click repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one visit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(
        &self,
        tag_id: TagId,
        ip: Option<&str>,
        user_agent: Option<&str>,
        clicked_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO click (tag_id, timestamp, ip, ua) VALUES (?, ?, ?, ?)")
            .bind(tag_id)
            .bind(clicked_at)
            .bind(ip)
            .bind(user_agent)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Click counts per UTC day from `start` onwards. Days without clicks are
    /// absent; callers zero-fill.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if a stored timestamp is unreadable.
    pub async fn daily_counts(
        &self,
        tag_id: TagId,
        start: NaiveDate,
    ) -> Result<Vec<(NaiveDate, i64)>, RepositoryError> {
        let rows = sqlx::query_as::<_, DailyCountRow>(
            r"
            SELECT date(timestamp) AS day, COUNT(*) AS clicks
            FROM click
            WHERE tag_id = ? AND date(timestamp) >= ?
            GROUP BY day
            ORDER BY day
            ",
        )
        .bind(tag_id)
        .bind(start.format("%Y-%m-%d").to_string())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                NaiveDate::parse_from_str(&r.day, "%Y-%m-%d")
                    .map(|d| (d, r.clicks))
                    .map_err(|e| {
                        RepositoryError::DataCorruption(format!("click day '{}': {e}", r.day))
                    })
            })
            .collect()
    }

    /// Lifetime click count for a tag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn total_for_tag(&self, tag_id: TagId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM click WHERE tag_id = ?")
            .bind(tag_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use tagcard_core::Shortid;

    use super::*;
    use crate::db::tags::TagRepository;
    use crate::db::test_support;

    #[tokio::test]
    async fn test_daily_counts_bucket_by_utc_day() {
        let (pool, _dir) = test_support::pool().await;
        let tag = TagRepository::new(&pool)
            .insert(&Shortid::parse("click001").unwrap(), None, None)
            .await
            .unwrap();
        let clicks = ClickRepository::new(&pool);

        let morning = Utc.with_ymd_and_hms(2026, 3, 10, 0, 5, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 59).unwrap();
        let before = Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap();
        for at in [morning, night, before, morning + Duration::days(1)] {
            clicks.record(tag.id, Some("10.0.0.1"), None, at).await.unwrap();
        }

        let start = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let counts = clicks.daily_counts(tag.id, start).await.unwrap();
        assert_eq!(
            counts,
            vec![
                (NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(), 2),
                (NaiveDate::from_ymd_opt(2026, 3, 11).unwrap(), 1),
            ]
        );
        assert_eq!(clicks.total_for_tag(tag.id).await.unwrap(), 4);
    }
}
