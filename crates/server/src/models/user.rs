//! User domain types.

use chrono::{DateTime, Utc};

use tagcard_core::{Email, UserId};

/// A registered account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    /// Normalized (trimmed, lowercased) email; unique across accounts.
    pub email: Email,
    /// Optional display name given at registration.
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}
