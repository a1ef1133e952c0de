//! QR code images for single tags.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::qr::{QrOptions, png_file_name, render_png};
use crate::services::tags::{TagError, TagService};
use crate::state::AppState;

/// `?size=&border=`. Blank or non-numeric values use the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct QrQuery {
    pub size: Option<String>,
    pub border: Option<String>,
}

impl QrQuery {
    pub(crate) fn options(&self) -> QrOptions {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse().ok());
        QrOptions::clamped(parse(&self.size), parse(&self.border))
    }
}

/// PNG QR code pointing at the tag's public page.
#[instrument(skip_all, fields(shortid = %shortid))]
pub async fn qr_png(
    State(state): State<AppState>,
    Path(shortid): Path<String>,
    Query(query): Query<QrQuery>,
) -> Result<Response> {
    let tag = TagService::new(state.pool())
        .find(&shortid)
        .await
        .map_err(|e| match e {
            TagError::NotFound => AppError::NotFound(format!("tag {shortid}")),
            other => other.into(),
        })?;

    let png = render_png(&state.config().public_tag_url(tag.shortid.as_str()), query.options())?;
    let disposition = format!("inline; filename=\"{}\"", png_file_name(&tag.shortid));

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        png,
    )
        .into_response())
}
