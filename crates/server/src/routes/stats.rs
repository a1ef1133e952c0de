//! Click statistics: owner page and JSON series.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::tags::tag_not_found;
use crate::services::analytics::{AnalyticsService, StatsSeries, clamp_days};
use crate::services::tags::{TagError, TagService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<String>,
}

impl StatsQuery {
    /// Requested window, clamped. Unparseable values fall back to the default.
    fn days(&self) -> u32 {
        clamp_days(self.days.as_deref().and_then(|d| d.trim().parse().ok()))
    }
}

/// One day in the stats table.
#[derive(Debug, PartialEq, Eq)]
pub struct StatsRow {
    pub label: String,
    pub clicks: i64,
    /// Bar width relative to the busiest day, 0-100.
    pub percent: i64,
}

/// Stats page template.
#[derive(Template, WebTemplate)]
#[template(path = "stats.html")]
pub struct StatsTemplate {
    pub shortid: String,
    pub days: u32,
    pub rows: Vec<StatsRow>,
    pub total: i64,
}

fn table_rows(series: StatsSeries) -> Vec<StatsRow> {
    let peak = series.values.iter().copied().max().unwrap_or(0);
    series
        .labels
        .into_iter()
        .zip(series.values)
        .map(|(label, clicks)| StatsRow {
            label,
            clicks,
            percent: if peak > 0 { clicks * 100 / peak } else { 0 },
        })
        .collect()
}

async fn owned_series(
    state: &AppState,
    shortid: &str,
    user_id: tagcard_core::UserId,
    days: u32,
) -> Result<StatsSeries, TagError> {
    let tag = TagService::new(state.pool())
        .find_owned(shortid, user_id)
        .await?;
    Ok(AnalyticsService::new(state.pool())
        .daily(&tag, days, Utc::now().date_naive())
        .await?)
}

/// Owner-only stats page with a daily table; `stats.js` draws the chart.
#[instrument(skip_all, fields(shortid = %shortid))]
pub async fn stats_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(shortid): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Response {
    match owned_series(&state, &shortid, user.id, query.days()).await {
        Ok(series) => StatsTemplate {
            total: series.total(),
            shortid: series.shortid.clone(),
            days: series.days,
            rows: table_rows(series),
        }
        .into_response(),
        Err(TagError::NotFound) => tag_not_found(&state, &shortid),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Daily click series as JSON.
#[instrument(skip_all, fields(shortid = %shortid))]
pub async fn api_stats(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(shortid): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsSeries>, AppError> {
    Ok(Json(
        owned_series(&state, &shortid, user.id, query.days()).await?,
    ))
}
