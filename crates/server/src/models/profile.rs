//! Profile domain types.

use chrono::{DateTime, Utc};

use tagcard_core::{ProfileId, TagId};

/// Theme color used when a profile has none stored.
pub const DEFAULT_THEME_COLOR: &str = "#2563eb";

/// The public card attached to a tag.
///
/// Values are shown exactly as stored; normalization happens only on edit.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: ProfileId,
    pub tag_id: TagId,
    pub full_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub image_url: Option<String>,
    pub phone: Option<String>,
    pub public_email: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
    pub whatsapp: Option<String>,
    pub iban: Option<String>,
    pub theme_color: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    #[must_use]
    pub fn theme_color_or_default(&self) -> &str {
        self.theme_color.as_deref().unwrap_or(DEFAULT_THEME_COLOR)
    }
}

/// A normalized edit, ready to be written.
///
/// Text fields replace the stored value (`None` clears it). `theme_color`
/// and `image_url` are only written when `Some`; otherwise the stored value
/// is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub phone: Option<String>,
    pub public_email: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
    pub whatsapp: Option<String>,
    pub iban: Option<String>,
    pub theme_color: Option<String>,
    pub image_url: Option<String>,
}
