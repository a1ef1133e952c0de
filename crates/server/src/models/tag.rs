//! Tag domain types.

use chrono::{DateTime, Utc};

use tagcard_core::{Shortid, TagId, TagStatus, UserId};

/// A provisioned NFC tag.
///
/// `owner_user_id` is set exactly once, by a claim, and never changes after.
#[derive(Debug, Clone)]
pub struct Tag {
    pub id: TagId,
    pub shortid: Shortid,
    /// Opaque 32-hex-char identifier assigned at provisioning.
    pub stable_id: String,
    pub site_code: Option<String>,
    pub server_code: Option<String>,
    pub owner_user_id: Option<UserId>,
    pub status: TagStatus,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    #[must_use]
    pub const fn is_claimed(&self) -> bool {
        self.owner_user_id.is_some()
    }

    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_user_id == Some(user_id)
    }
}

/// One row of the owner dashboard.
#[derive(Debug, Clone)]
pub struct OwnedTagSummary {
    pub shortid: Shortid,
    pub clicks: i64,
    pub created_at: DateTime<Utc>,
}
