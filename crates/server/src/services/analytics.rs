//! Click analytics: daily buckets over a trailing window.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::RepositoryError;
use crate::db::clicks::ClickRepository;
use crate::models::Tag;

pub const DEFAULT_DAYS: u32 = 7;
pub const MAX_DAYS: u32 = 90;

/// Clamp a requested window to `[1, MAX_DAYS]`; absent means `DEFAULT_DAYS`.
#[must_use]
pub fn clamp_days(requested: Option<i64>) -> u32 {
    requested.map_or(DEFAULT_DAYS, |d| {
        u32::try_from(d.clamp(1, i64::from(MAX_DAYS))).unwrap_or(DEFAULT_DAYS)
    })
}

/// First day of a `days`-long window ending on `today`.
#[must_use]
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// One entry per day from `start`, zero where `counts` has no row.
#[must_use]
pub fn daily_series(start: NaiveDate, days: u32, counts: &[(NaiveDate, i64)]) -> Vec<(NaiveDate, i64)> {
    let by_day: HashMap<NaiveDate, i64> = counts.iter().copied().collect();
    start
        .iter_days()
        .take(days as usize)
        .map(|day| (day, by_day.get(&day).copied().unwrap_or(0)))
        .collect()
}

/// Chart payload served by `/api/stats/{shortid}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSeries {
    pub shortid: String,
    pub days: u32,
    pub labels: Vec<String>,
    pub values: Vec<i64>,
}

impl StatsSeries {
    #[must_use]
    pub fn total(&self) -> i64 {
        self.values.iter().sum()
    }
}

/// Analytics service.
pub struct AnalyticsService<'a> {
    clicks: ClickRepository<'a>,
}

impl<'a> AnalyticsService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            clicks: ClickRepository::new(pool),
        }
    }

    /// Daily click counts for `tag` over the `days` ending on `today`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the aggregate query fails.
    pub async fn daily(
        &self,
        tag: &Tag,
        days: u32,
        today: NaiveDate,
    ) -> Result<StatsSeries, RepositoryError> {
        let start = window_start(today, days);
        let counts = self.clicks.daily_counts(tag.id, start).await?;
        let series = daily_series(start, days, &counts);

        Ok(StatsSeries {
            shortid: tag.shortid.to_string(),
            days,
            labels: series
                .iter()
                .map(|(day, _)| day.format("%Y-%m-%d").to_string())
                .collect(),
            values: series.into_iter().map(|(_, count)| count).collect(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use tagcard_core::Shortid;

    use super::*;
    use crate::db::tags::TagRepository;
    use crate::db::test_support;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_clamp_days() {
        assert_eq!(clamp_days(None), 7);
        assert_eq!(clamp_days(Some(0)), 1);
        assert_eq!(clamp_days(Some(-5)), 1);
        assert_eq!(clamp_days(Some(30)), 30);
        assert_eq!(clamp_days(Some(1000)), 90);
    }

    #[test]
    fn test_window_start() {
        assert_eq!(window_start(date("2026-10-19"), 7), date("2026-10-13"));
        assert_eq!(window_start(date("2026-10-19"), 1), date("2026-10-19"));
        assert_eq!(window_start(date("2026-03-02"), 3), date("2026-02-28"));
    }

    #[test]
    fn test_daily_series_zero_fills() {
        let series = daily_series(date("2026-10-13"), 7, &[(date("2026-10-15"), 3)]);
        assert_eq!(series.len(), 7);
        assert_eq!(series[0], (date("2026-10-13"), 0));
        assert_eq!(series[2], (date("2026-10-15"), 3));
        assert_eq!(series[6].0, date("2026-10-19"));
        assert_eq!(series.iter().filter(|(_, c)| *c > 0).count(), 1);
    }

    #[tokio::test]
    async fn test_daily_counts_one_day() {
        let (pool, _dir) = test_support::pool().await;
        let tag = TagRepository::new(&pool)
            .insert(&Shortid::parse("stat0001").unwrap(), None, None)
            .await
            .unwrap();
        let clicks = ClickRepository::new(&pool);
        let day = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        for minutes in [0, 5, 200] {
            clicks
                .record(tag.id, None, None, day + chrono::Duration::minutes(minutes))
                .await
                .unwrap();
        }
        // Outside the window.
        clicks
            .record(tag.id, None, None, Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();

        let stats = AnalyticsService::new(&pool)
            .daily(&tag, 7, date("2026-10-19"))
            .await
            .unwrap();

        assert_eq!(stats.shortid, "stat0001");
        assert_eq!(stats.labels.first().map(String::as_str), Some("2026-10-13"));
        assert_eq!(stats.labels.last().map(String::as_str), Some("2026-10-19"));
        assert_eq!(stats.values, vec![0, 0, 0, 3, 0, 0, 0]);
        assert_eq!(stats.total(), 3);
    }
}
