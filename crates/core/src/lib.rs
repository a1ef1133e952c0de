//! Tagcard Core - Shared types library.
//!
//! This crate provides common types used across all Tagcard components:
//! - `server` - Public profile pages, owner dashboard, admin tools
//! - `cli` - Command-line tools for schema bootstrap and inventory
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, shortids, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
