//! Public tag identifier.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Shortid`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShortidError {
    #[error("shortid cannot be empty")]
    Empty,
    #[error("shortid must be at most {max} characters")]
    TooLong { max: usize },
    #[error("shortid may only contain letters, digits, '-' and '_'")]
    InvalidCharacter,
}

/// The short public code printed on a tag and used in its URLs (`/t/{shortid}`).
///
/// Generated codes are 8 alphanumeric characters, but imported inventory may
/// carry longer codes, so parsing accepts up to [`Shortid::MAX_LENGTH`]
/// URL-safe characters.
///
/// ```
/// use tagcard_core::Shortid;
///
/// assert!(Shortid::parse("Ab3dE9xZ").is_ok());
/// assert!(Shortid::parse("../etc").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Shortid(String);

impl Shortid {
    /// Length of codes produced by the generator.
    pub const GENERATED_LENGTH: usize = 8;
    /// Longest accepted code.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a shortid, rejecting anything unsafe to place in a path or filename.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or contains characters
    /// other than ASCII letters, digits, `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, ShortidError> {
        if s.is_empty() {
            return Err(ShortidError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ShortidError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ShortidError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Shortid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Shortid {
    type Err = ShortidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Shortid {
    type Error = ShortidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Shortid> for String {
    fn from(value: Shortid) -> Self {
        value.0
    }
}

impl AsRef<str> for Shortid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "sqlite")]
impl sqlx::Type<sqlx::Sqlite> for Shortid {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

#[cfg(feature = "sqlite")]
impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for Shortid {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        // Legacy rows may predate validation; keep them readable.
        Ok(Self(s))
    }
}

#[cfg(feature = "sqlite")]
impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for Shortid {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(Shortid::parse("Ab3dE9xZ").unwrap().as_str(), "Ab3dE9xZ");
        assert!(Shortid::parse("legacy-code_01").is_ok());
    }

    #[test]
    fn test_parse_rejects_path_characters() {
        assert_eq!(
            Shortid::parse("../x"),
            Err(ShortidError::InvalidCharacter)
        );
        assert_eq!(Shortid::parse("a b"), Err(ShortidError::InvalidCharacter));
        assert_eq!(Shortid::parse("a/b"), Err(ShortidError::InvalidCharacter));
    }

    #[test]
    fn test_parse_length_limits() {
        assert_eq!(Shortid::parse(""), Err(ShortidError::Empty));
        assert!(Shortid::parse(&"a".repeat(64)).is_ok());
        assert!(matches!(
            Shortid::parse(&"a".repeat(65)),
            Err(ShortidError::TooLong { max: 64 })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Shortid>("\"abc12345\"").is_ok());
        assert!(serde_json::from_str::<Shortid>("\"a/b\"").is_err());
    }
}
