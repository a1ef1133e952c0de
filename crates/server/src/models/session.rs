//! Session-derived identity.

use tagcard_core::{Email, UserId};

/// The signed-in user, resolved from the session cookie for one request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub name: Option<String>,
    /// Email is on the configured admin allow-list.
    pub is_admin: bool,
}
