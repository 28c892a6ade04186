//! Business logic services for the storefront.
//!
//! - `tokens` - Signing, verifying and revoking session and reset tokens
//! - `auth` - Signup, login, logout, refresh and password reset
//! - `catalog` - Product management and the cached featured list
//! - `email` - Outbound email delivery

pub mod auth;
pub mod catalog;
pub mod email;
pub mod tokens;
