//! Business logic services.
//!
//! Services borrow the pool for the duration of one request and own no
//! state of their own.
//!
//! - `auth` - Registration (with tag claim) and password login
//! - `session` - Signed session tokens
//! - `tags` - Tag lookup, claiming and public views
//! - `profile` - Profile normalization and avatar storage
//! - `analytics` - Daily click series
//! - `inventory` - Shortid generation and CSV import
//! - `qr` - QR PNG rendering and ZIP export

pub mod analytics;
pub mod auth;
pub mod inventory;
pub mod profile;
pub mod qr;
pub mod session;
pub mod tags;
