//! Core types for Tagcard.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod shortid;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use shortid::{Shortid, ShortidError};
pub use status::{TagStatus, TagStatusError};
