//! Bazaar shop API library.
//!
//! Accounts with cookie-carried JWT sessions, an emailed password reset
//! flow, and a product catalog whose featured list is served cache-aside.
//! The binary in `main.rs` wires these to `PostgreSQL`, Redis and SMTP;
//! tests wire them to in-memory backends.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
