//! Signed session and password-reset tokens.
//!
//! Three token kinds, each HS256 with its own secret:
//!
//! | Kind | Lifetime | Stored |
//! |------|----------|--------|
//! | access | 15 minutes | never |
//! | refresh | 7 days | `refresh_token:<userId>` in the session cache |
//! | password reset | 15 minutes | never |
//!
//! A user has at most one live refresh token: persisting a new one overwrites
//! the old, and deleting the entry revokes the session.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

use bazaar_core::UserId;

use crate::cache::{CacheError, SessionCache, refresh_token_key};
use crate::clock::Clock;
use crate::config::TokenSecrets;
use crate::models::TokenPair;

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
/// Lifetime of a refresh token (and of its cache entry).
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Lifetime of a password reset token.
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

const RESET_PURPOSE: &str = "password_reset";

/// Errors from token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, wrong kind, malformed, or expired.
    #[error("invalid token")]
    Invalid,

    /// Validly signed, but not the user's current refresh token.
    #[error("refresh token is no longer current")]
    Stale,

    /// A password reset token failed verification for any reason.
    #[error("invalid or expired reset token")]
    InvalidOrExpired,

    /// The token could not be signed.
    #[error("token encoding failed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),

    /// The session cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    kind: TokenKind,
    iat: i64,
    exp: i64,
    jti: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    sub: String,
    purpose: String,
    iat: i64,
    exp: i64,
    jti: Uuid,
}

/// Whether an expired token is still acceptable.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Expiry {
    Enforce,
    Ignore,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(TokenError::Encoding)
    }

    /// Check the signature and claim shape. Expiry is left to the caller so
    /// it can be judged against the injected clock.
    fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        jsonwebtoken::decode::<T>(token, &self.decoding, &validation)
            .ok()
            .map(|data| data.claims)
    }
}

fn seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// Issues, verifies and revokes tokens.
///
/// Cheap to clone; clones share keys, cache and clock.
#[derive(Clone)]
pub struct TokenService {
    inner: Arc<TokenServiceInner>,
}

struct TokenServiceInner {
    access: SigningKeys,
    refresh: SigningKeys,
    reset: SigningKeys,
    cache: Arc<dyn SessionCache>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Create a token service from explicit secrets.
    #[must_use]
    pub fn new(
        secrets: &TokenSecrets,
        cache: Arc<dyn SessionCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(TokenServiceInner {
                access: SigningKeys::from_secret(&secrets.access),
                refresh: SigningKeys::from_secret(&secrets.refresh),
                reset: SigningKeys::from_secret(&secrets.reset),
                cache,
                clock,
            }),
        }
    }

    // =========================================================================
    // Session tokens
    // =========================================================================

    /// Mint an access/refresh pair for a user. Nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue_session_tokens(&self, user_id: UserId) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign_session(user_id, TokenKind::Access)?,
            refresh_token: self.sign_session(user_id, TokenKind::Refresh)?,
        })
    }

    /// Make `refresh_token` the user's one live refresh token.
    ///
    /// Replaces whatever was stored before, which ends any earlier session.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Cache` if the write fails.
    pub async fn persist_refresh_token(
        &self,
        user_id: UserId,
        refresh_token: &str,
    ) -> Result<(), TokenError> {
        self.inner
            .cache
            .set(
                &refresh_token_key(user_id),
                refresh_token,
                Some(REFRESH_TOKEN_TTL),
            )
            .await?;
        Ok(())
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The refresh token must verify and be the one currently stored for its
    /// user. It is not rotated.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if the token does not verify,
    /// `TokenError::Stale` if it is not the stored token, or
    /// `TokenError::Cache` if the lookup fails.
    pub async fn verify_and_rotate_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<(UserId, String), TokenError> {
        let user_id = self.verify_session(
            &self.inner.refresh,
            refresh_token,
            TokenKind::Refresh,
            Expiry::Enforce,
        )?;

        let stored = self.inner.cache.get(&refresh_token_key(user_id)).await?;
        if stored.as_deref() != Some(refresh_token) {
            return Err(TokenError::Stale);
        }

        let access_token = self.sign_session(user_id, TokenKind::Access)?;
        Ok((user_id, access_token))
    }

    /// End the session a refresh token belongs to.
    ///
    /// The signature must verify, but an expired token or one that is no
    /// longer stored is still accepted. Revoking twice is fine.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if the token does not verify, or
    /// `TokenError::Cache` if the delete fails.
    pub async fn revoke_session(&self, refresh_token: &str) -> Result<UserId, TokenError> {
        let user_id = self.verify_session(
            &self.inner.refresh,
            refresh_token,
            TokenKind::Refresh,
            Expiry::Ignore,
        )?;
        self.revoke_user_session(user_id).await?;
        Ok(user_id)
    }

    /// Delete whatever refresh token is stored for a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Cache` if the delete fails.
    pub async fn revoke_user_session(&self, user_id: UserId) -> Result<(), TokenError> {
        self.inner.cache.del(&refresh_token_key(user_id)).await?;
        Ok(())
    }

    /// Verify an access token without touching the cache.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` on any failure.
    pub fn verify_access_token(&self, token: &str) -> Result<UserId, TokenError> {
        self.verify_session(
            &self.inner.access,
            token,
            TokenKind::Access,
            Expiry::Enforce,
        )
    }

    // =========================================================================
    // Password reset tokens
    // =========================================================================

    /// Mint a 15-minute password reset token. Nothing is stored, so every
    /// issued token stays usable until it expires.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue_password_reset_token(&self, user_id: UserId) -> Result<String, TokenError> {
        let iat = self.inner.clock.now().timestamp();
        self.inner.reset.sign(&ResetClaims {
            sub: user_id.to_string(),
            purpose: RESET_PURPOSE.to_owned(),
            iat,
            exp: iat.saturating_add(seconds(RESET_TOKEN_TTL)),
            jti: Uuid::new_v4(),
        })
    }

    /// Verify a password reset token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidOrExpired` on any failure; a bad signature
    /// and an expired token look the same to the caller.
    pub fn verify_password_reset_token(&self, token: &str) -> Result<UserId, TokenError> {
        let claims: ResetClaims = self
            .inner
            .reset
            .verify(token)
            .ok_or(TokenError::InvalidOrExpired)?;

        if claims.purpose != RESET_PURPOSE || self.is_expired(claims.exp) {
            return Err(TokenError::InvalidOrExpired);
        }

        claims
            .sub
            .parse()
            .map_err(|_| TokenError::InvalidOrExpired)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn sign_session(&self, user_id: UserId, kind: TokenKind) -> Result<String, TokenError> {
        let (keys, ttl) = match kind {
            TokenKind::Access => (&self.inner.access, ACCESS_TOKEN_TTL),
            TokenKind::Refresh => (&self.inner.refresh, REFRESH_TOKEN_TTL),
        };
        let iat = self.inner.clock.now().timestamp();

        keys.sign(&SessionClaims {
            sub: user_id.to_string(),
            kind,
            iat,
            exp: iat.saturating_add(seconds(ttl)),
            jti: Uuid::new_v4(),
        })
    }

    fn verify_session(
        &self,
        keys: &SigningKeys,
        token: &str,
        kind: TokenKind,
        expiry: Expiry,
    ) -> Result<UserId, TokenError> {
        let claims: SessionClaims = keys.verify(token).ok_or(TokenError::Invalid)?;

        if claims.kind != kind {
            return Err(TokenError::Invalid);
        }
        if expiry == Expiry::Enforce && self.is_expired(claims.exp) {
            return Err(TokenError::Invalid);
        }

        claims.sub.parse().map_err(|_| TokenError::Invalid)
    }

    fn is_expired(&self, exp: i64) -> bool {
        self.inner.clock.now().timestamp() >= exp
    }
}
