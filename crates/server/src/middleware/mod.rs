//! HTTP middleware stack.
//!
//! Layers are assembled in [`crate::app::router`]; this module also holds
//! the request extractors for sessions, auth and client info.

pub mod auth;
pub mod client_info;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAuth, RequireAdmin, RequireAuth};
pub use client_info::ClientInfo;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{clear_session, set_session};
