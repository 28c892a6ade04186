//! Session-related types.

use bazaar_core::{Email, Role, UserId};

/// Cookie names carrying the session tokens.
pub mod cookies {
    /// Short-lived access token.
    pub const ACCESS_TOKEN: &str = "accessToken";

    /// Long-lived refresh token.
    pub const REFRESH_TOKEN: &str = "refreshToken";
}

/// A freshly minted access/refresh token pair.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Permission level at the time of the request.
    pub role: Role,
}
