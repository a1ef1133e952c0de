//! Owner dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::db::tags::TagRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::OwnedTagSummary;
use crate::state::AppState;

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub email: String,
    pub name: Option<String>,
    pub tags: Vec<OwnedTagSummary>,
    pub total_clicks: i64,
    pub is_admin: bool,
}

/// The signed-in user's tags with lifetime click counts.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let tags = TagRepository::new(state.pool())
        .list_owned_with_counts(user.id)
        .await?;

    Ok(DashboardTemplate {
        email: user.email.to_string(),
        name: user.name,
        total_clicks: tags.iter().map(|t| t.clicks).sum(),
        tags,
        is_admin: user.is_admin,
    })
}
