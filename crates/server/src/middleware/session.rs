//! Session cookie handling.
//!
//! The cookie holds a signed token from [`SessionSigner`](crate::services::session::SessionSigner);
//! there is no server-side session store.

use chrono::Utc;
use tower_cookies::cookie::{SameSite, time};
use tower_cookies::{Cookie, Cookies};

use tagcard_core::UserId;

use crate::config::SessionConfig;
use crate::state::AppState;

fn build_cookie(config: &SessionConfig, value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure)
        .max_age(max_age)
        .build()
}

/// Issue a fresh session cookie for `user_id`.
pub fn set_session(cookies: &Cookies, state: &AppState, user_id: UserId) {
    let config = &state.config().session;
    let token = state.signer().issue(user_id, Utc::now());
    let max_age = time::Duration::seconds(i64::try_from(config.max_age.as_secs()).unwrap_or(i64::MAX));
    cookies.add(build_cookie(config, token, max_age));
}

/// Remove the session cookie (logout).
pub fn clear_session(cookies: &Cookies, state: &AppState) {
    cookies.remove(build_cookie(&state.config().session, String::new(), time::Duration::ZERO));
}

/// The user id carried by a valid session cookie, if any.
#[must_use]
pub fn session_user_id(cookies: &Cookies, state: &AppState) -> Option<UserId> {
    let config = &state.config().session;
    let cookie = cookies.get(&config.cookie_name)?;
    state
        .signer()
        .validate(cookie.value(), config.max_age, Utc::now())
}
