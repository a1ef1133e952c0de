//! Authentication route handlers.
//!
//! Registration is only reachable from a scanned tag: the form carries the
//! tag's shortid and the new account claims it in the same transaction.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_cookies::Cookies;
use tracing::instrument;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_session, set_session};
use crate::services::auth::{AuthError, AuthService, Registration};
use crate::state::AppState;

/// Where to go after login when no (safe) `next` was given.
pub const DEFAULT_NEXT: &str = "/dashboard";

const NO_TAG_ERROR: &str = "Scan your NFC tag before creating an account.";

/// Only same-site absolute paths are allowed as post-login destinations.
#[must_use]
pub fn sanitize_next(next: Option<&str>) -> String {
    let Some(next) = next.map(str::trim).filter(|n| !n.is_empty()) else {
        return DEFAULT_NEXT.to_string();
    };
    if !next.starts_with('/') || next.starts_with("//") || next.starts_with("/\\") {
        return DEFAULT_NEXT.to_string();
    }
    next.to_string()
}

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next_url: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pending_shortid: String,
    #[serde(default)]
    pub next_url: Option<String>,
}

// =============================================================================
// Query Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    pub pending_shortid: Option<String>,
    pub next: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// `invalid` or `exists`.
    pub e: Option<String>,
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub next_url: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub pending_shortid: Option<String>,
    pub next_url: String,
    pub error: Option<String>,
    pub email: String,
    pub name: String,
}

impl RegisterTemplate {
    fn new(pending_shortid: Option<String>, next: Option<&str>, error: Option<String>) -> Self {
        let pending_shortid = pending_shortid.filter(|s| !s.trim().is_empty());
        let error = error.or_else(|| pending_shortid.is_none().then(|| NO_TAG_ERROR.to_string()));
        Self {
            pending_shortid,
            next_url: sanitize_next(next),
            error,
            email: String::new(),
            name: String::new(),
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(Query(query): Query<RegisterQuery>) -> impl IntoResponse {
    RegisterTemplate::new(query.pending_shortid, query.next.as_deref(), query.error)
}

/// Handle registration form submission.
///
/// On success the session cookie is set and the user lands on `next`, or on
/// the claim page of their tag when no specific destination was requested.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<RegisterForm>,
) -> Response {
    let result = AuthService::new(state.pool())
        .register(Registration {
            email: &form.email,
            password: &form.password,
            name: form.name.as_deref(),
            pending_shortid: &form.pending_shortid,
        })
        .await;

    match result {
        Ok((user, shortid)) => {
            set_session(&cookies, &state, user.id);
            set_sentry_user(&user.id, Some(user.email.as_str()));

            let mut destination = sanitize_next(form.next_url.as_deref());
            if destination == DEFAULT_NEXT {
                destination = format!("/claim/{shortid}");
            }
            Redirect::to(&destination).into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "Registration failed");
            let err = AppError::from(err);
            if err.is_server_error() {
                return err.into_response();
            }

            // Tag problems cannot be fixed by retyping; drop the shortid.
            let keep_tag = !matches!(
                err,
                AppError::Auth(
                    AuthError::MissingPendingTag
                        | AuthError::TagNotFound
                        | AuthError::TagAlreadyClaimed
                )
            );
            let pending = keep_tag.then(|| form.pending_shortid.trim().to_string());
            let mut page = RegisterTemplate::new(
                pending,
                form.next_url.as_deref(),
                Some(err.public_message()),
            );
            page.email = form.email.trim().to_string();
            page.name = form.name.unwrap_or_default();

            (err.status(), page).into_response()
        }
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(Query(query): Query<LoginQuery>) -> impl IntoResponse {
    let error = match query.e.as_deref() {
        Some("invalid") => Some("Invalid email or password.".to_string()),
        Some("exists") => Some("This email is already registered. Please sign in.".to_string()),
        _ => None,
    };
    LoginTemplate {
        error,
        next_url: sanitize_next(query.next.as_deref()),
    }
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = sanitize_next(form.next_url.as_deref());

    match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            set_session(&cookies, &state, user.id);
            set_sentry_user(&user.id, Some(user.email.as_str()));
            tracing::info!(user_id = %user.id, "User logged in");
            Redirect::to(&next).into_response()
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Login rejected");
            let mut target = "/login?e=invalid".to_string();
            if next != DEFAULT_NEXT {
                target.push_str("&next=");
                target.push_str(&urlencoding::encode(&next));
            }
            Redirect::to(&target).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Response {
    clear_session(&cookies, &state);
    clear_sentry_user();
    Redirect::to("/").into_response()
}
