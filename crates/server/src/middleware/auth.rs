//! Authentication extractors.
//!
//! The user is resolved from the signed session cookie on every request.
//! Invalid, expired or orphaned tokens are treated as anonymous.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;

use crate::db::users::UserRepository;
use crate::error::AppError;
use crate::models::CurrentUser;
use crate::state::AppState;

use super::session::session_user_id;

/// Extractor that requires a signed-in user.
///
/// Page requests without a session are redirected to `/login?next=...`;
/// `/api/` requests get a bare 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a signed-in admin.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor that optionally gets the current user.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Rejection for the auth extractors.
pub enum AuthRejection {
    /// Redirect to the login page, returning to `next` afterwards.
    RedirectToLogin { next: String },
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in, but not an admin.
    Forbidden,
    /// The user lookup failed.
    Internal(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next } => Redirect::to(&login_url(&next)).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Admins only").into_response(),
            Self::Internal(err) => err.into_response(),
        }
    }
}

/// `/login?next=...` with `next` percent-encoded.
#[must_use]
pub fn login_url(next: &str) -> String {
    format!("/login?next={}", urlencoding::encode(next))
}

/// Load the user behind the session cookie, if any.
async fn resolve_user(parts: &mut Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    let cookies = Cookies::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| AppError::Internal(msg.to_string()))?;

    let Some(user_id) = session_user_id(&cookies, state) else {
        return Ok(None);
    };

    let user = UserRepository::new(state.pool()).get_by_id(user_id).await?;
    Ok(user.map(|user| {
        let is_admin = state.config().is_admin(&user.email);
        CurrentUser {
            id: user.id,
            email: user.email,
            name: user.name,
            is_admin,
        }
    }))
}

/// Nested routers strip their prefix from `parts.uri`.
fn original_uri(parts: &Parts) -> &Uri {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0)
}

fn anonymous_rejection(parts: &Parts) -> AuthRejection {
    let uri = original_uri(parts);
    if uri.path().starts_with("/api/") {
        return AuthRejection::Unauthorized;
    }
    let next = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_owned(), |pq| pq.as_str().to_owned());
    AuthRejection::RedirectToLogin { next }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve_user(parts, state)
            .await
            .map_err(AuthRejection::Internal)?
            .map(Self)
            .ok_or_else(|| anonymous_rejection(parts))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if user.is_admin {
            Ok(Self(user))
        } else {
            tracing::warn!(user_id = %user.id, path = %original_uri(parts).path(), "Non-admin denied");
            Err(AuthRejection::Forbidden)
        }
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve_user(parts, state).await {
            Ok(user) => Ok(Self(user)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve session user");
                Ok(Self(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_encodes_next() {
        assert_eq!(login_url("/claim/abc"), "/login?next=%2Fclaim%2Fabc");
        assert_eq!(
            login_url("/stats/abc?days=30"),
            "/login?next=%2Fstats%2Fabc%3Fdays%3D30"
        );
    }
}
