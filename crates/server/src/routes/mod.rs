//! HTTP route handlers for Tagcard.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                         - Landing page
//! GET  /health                   - Liveness check
//! GET  /health/ready             - Readiness check (database)
//!
//! # Auth
//! GET  /register                 - Register page (?pending_shortid=&next=)
//! POST /register                 - Create account, sign in
//! GET  /login                    - Login page (?e=invalid&next=)
//! POST /login                    - Sign in
//! POST /logout                   - Sign out
//!
//! # Tags
//! GET  /t/{shortid}              - Public profile (records a click)
//! GET  /claim-info/{shortid}     - Landing for unclaimed tags
//! GET  /claim/{shortid}          - Claim confirmation (requires auth)
//! POST /claim/{shortid}          - Claim (requires auth)
//! GET  /edit/{shortid}           - Profile editor (owner only)
//! POST /edit/{shortid}           - Save profile, multipart (owner only)
//! GET  /qr/{shortid}             - QR code PNG (?size=&border=)
//!
//! # Owner
//! GET  /dashboard                - Owned tags with click counts
//! GET  /stats/{shortid}          - Daily clicks page (?days=)
//! GET  /api/stats/{shortid}      - Daily clicks JSON (?days=)
//! GET  /api/options              - Sidebar menu JSON
//!
//! # Admin (ADMIN_EMAILS only)
//! POST /admin/generate           - Provision tags, download CSV
//! GET  /admin/unassigned         - Unowned tags
//! POST /admin/inventory_import   - Import pasted CSV inventory
//! POST /admin/qrzip              - ZIP of QR codes
//! ```

pub mod admin;
pub mod api;
pub mod auth;
pub mod dashboard;
pub mod home;
pub mod qr;
pub mod stats;
pub mod tags;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the tag routes router.
pub fn tag_routes() -> Router<AppState> {
    Router::new()
        .route("/t/{shortid}", get(tags::public_tag))
        .route("/claim-info/{shortid}", get(tags::claim_info))
        .route("/claim/{shortid}", get(tags::claim_page).post(tags::claim))
        .route("/edit/{shortid}", get(tags::edit_page).post(tags::edit))
        .route("/qr/{shortid}", get(qr::qr_png))
        .route("/stats/{shortid}", get(stats::stats_page))
}

/// Create the JSON API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stats/{shortid}", get(stats::api_stats))
        .route("/options", get(api::options))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(admin::generate))
        .route("/unassigned", get(admin::unassigned))
        .route("/inventory_import", post(admin::inventory_import))
        .route("/qrzip", post(admin::qr_zip))
}

/// Create all routes for Tagcard.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(home::health))
        .route("/health/ready", get(home::readiness))
        .route("/dashboard", get(dashboard::dashboard))
        .merge(auth_routes())
        .merge(tag_routes())
        .nest("/api", api_routes())
        .nest("/admin", admin_routes())
}
