//! Tag lifecycle status.

use serde::{Deserialize, Serialize};

/// Error returned when a stored status string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid tag status: {0}")]
pub struct TagStatusError(pub String);

/// Whether a tag has been bound to an owner.
///
/// A tag is `Claimed` exactly when it has an owner. Older databases wrote
/// `"active"` for claimed tags; it still parses as [`TagStatus::Claimed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    #[default]
    Unassigned,
    Claimed,
}

impl TagStatus {
    /// The value stored in the `tag.status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unassigned => "unassigned",
            Self::Claimed => "claimed",
        }
    }
}

impl std::fmt::Display for TagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TagStatus {
    type Err = TagStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unassigned" => Ok(Self::Unassigned),
            "claimed" | "active" => Ok(Self::Claimed),
            other => Err(TagStatusError(other.to_owned())),
        }
    }
}
