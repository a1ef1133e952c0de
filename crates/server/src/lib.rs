//! Tagcard server library.
//!
//! NFC tags resolve to public profile pages. This crate holds the storage,
//! services and HTTP surface so the binary, the CLI and the integration
//! tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
