//! Router assembly.
//!
//! Layer order, outermost first:
//!
//! 1. Sentry hub and transaction
//! 2. `TraceLayer` (`http_request` span)
//! 3. Request ID (recorded into the span)
//! 4. Security headers
//! 5. Cookie manager
//! 6. Body limit (upload size)

use std::path::{Path, PathBuf};

use axum::{Router, extract::DefaultBodyLimit, middleware::from_fn};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    services::ServeDir,
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::middleware::{request_id_middleware, security_headers_middleware};
use crate::routes;
use crate::state::AppState;

/// CSS and JS bundled with the crate.
#[must_use]
pub fn static_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("static")
}

/// Build the complete application router.
pub fn router(state: AppState) -> Router {
    let upload_dir = state.config().upload_dir.clone();
    let body_limit = state.config().max_upload_bytes;

    Router::new()
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(static_dir()))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CookieManagerLayer::new())
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        #[allow(clippy::cast_possible_truncation)]
                        span.record("latency_ms", latency.as_millis() as u64);
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
