//! Domain models for Tagcard.
//!
//! Row types live next to their queries in `crate::db`; these are the
//! validated shapes handlers and templates work with.

pub mod profile;
pub mod session;
pub mod tag;
pub mod user;

pub use profile::{Profile, ProfileUpdate};
pub use session::CurrentUser;
pub use tag::{OwnedTagSummary, Tag};
pub use user::User;
