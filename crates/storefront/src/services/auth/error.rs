//! Authentication error types.

use thiserror::Error;

use crate::cache::CacheError;
use crate::db::RepositoryError;
use crate::services::tokens::TokenError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] bazaar_core::EmailError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Name missing.
    #[error("name is required")]
    InvalidName,

    /// An account with this email already exists.
    #[error("user already exists")]
    DuplicateEmail,

    /// Wrong password, or no such account. Deliberately one variant.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No usable refresh token was presented.
    #[error("not authenticated")]
    Unauthenticated,

    /// Password reset token failed verification.
    #[error("invalid or expired reset token")]
    InvalidOrExpiredToken,

    /// User not found.
    #[error("user not found")]
    NotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Session cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Token signing error.
    #[error("token error: {0}")]
    Token(TokenError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid | TokenError::Stale => Self::Unauthenticated,
            TokenError::InvalidOrExpired => Self::InvalidOrExpiredToken,
            TokenError::Cache(e) => Self::Cache(e),
            other @ TokenError::Encoding(_) => Self::Token(other),
        }
    }
}
