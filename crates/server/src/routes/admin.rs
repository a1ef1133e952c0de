//! Admin tools: tag generation, inventory import, bulk QR export.
//!
//! Every handler requires an admin (`ADMIN_EMAILS`); anonymous users are
//! sent to login and other users get 403.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::tags::TagRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::Tag;
use crate::routes::qr::QrQuery;
use crate::services::inventory::{GENERATED_CSV_NAME, InventoryService, clamp_count, render_csv};
use crate::services::qr::{BULK_ZIP_NAME, build_zip, parse_id_list};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub n: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportForm {
    #[serde(default)]
    pub csv_text: String,
}

#[derive(Debug, Deserialize)]
pub struct QrZipForm {
    #[serde(default)]
    pub ids: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub border: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnassignedQuery {
    pub import_ok: Option<usize>,
    pub skip: Option<usize>,
}

// =============================================================================
// Templates
// =============================================================================

/// Unassigned tags page, with the import and QR export forms.
#[derive(Template, WebTemplate)]
#[template(path = "admin/unassigned.html")]
pub struct UnassignedTemplate {
    pub tags: Vec<Tag>,
    pub import_ok: Option<usize>,
    pub skip: usize,
    pub public_base_url: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Provision `n` new tags and download their shortids as CSV.
#[instrument(skip_all, fields(admin = %admin.email))]
pub async fn generate(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<GenerateForm>,
) -> Result<Response> {
    let count = clamp_count(form.n.as_deref().and_then(|n| n.trim().parse().ok()));
    let shortids = InventoryService::new(state.pool()).generate(count).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{GENERATED_CSV_NAME}\""),
            ),
        ],
        render_csv(&shortids),
    )
        .into_response())
}

/// Unowned tags, newest first.
#[instrument(skip_all)]
pub async fn unassigned(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<UnassignedQuery>,
) -> Result<impl IntoResponse> {
    let tags = TagRepository::new(state.pool()).list_unassigned().await?;

    Ok(UnassignedTemplate {
        tags,
        import_ok: query.import_ok,
        skip: query.skip.unwrap_or(0),
        public_base_url: state.config().public_base_url.clone(),
    })
}

/// Import pasted inventory and report the counts via redirect.
#[instrument(skip_all, fields(admin = %admin.email))]
pub async fn inventory_import(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<ImportForm>,
) -> Result<Redirect> {
    let report = InventoryService::new(state.pool())
        .import(&form.csv_text)
        .await?;

    Ok(Redirect::to(&format!(
        "/admin/unassigned?import_ok={}&skip={}",
        report.created, report.skipped
    )))
}

/// ZIP of QR codes for the listed (existing) shortids.
#[instrument(skip_all, fields(admin = %admin.email))]
pub async fn qr_zip(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<QrZipForm>,
) -> Result<Response> {
    if form.ids.trim().is_empty() {
        return Err(AppError::BadRequest("No shortids given".into()));
    }

    // Malformed entries cannot name a tag; they count as missing.
    let requested = parse_id_list(&form.ids);
    let shortids = TagRepository::new(state.pool()).existing(&requested).await?;
    if shortids.is_empty() {
        return Err(AppError::BadRequest("None of the shortids exist".into()));
    }

    let options = QrQuery {
        size: form.size,
        border: form.border,
    }
    .options();
    let count = shortids.len();
    let task_state = state.clone();

    let archive = tokio::task::spawn_blocking(move || {
        build_zip(&shortids, options, |s| {
            task_state.config().public_tag_url(s.as_str())
        })
    })
    .await
    .map_err(|e| AppError::Internal(format!("QR export task failed: {e}")))??;

    tracing::info!(count, "Built QR archive");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{BULK_ZIP_NAME}\""),
            ),
        ],
        archive,
    )
        .into_response())
}
