//! Authentication service.
//!
//! Password signup and login, the refresh-token session lifecycle, and the
//! emailed password reset flow.

mod error;

pub use error::AuthError;

use std::sync::{Arc, LazyLock};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use bazaar_core::{Email, Role, UserId};

use crate::db::{RepositoryError, UserStore};
use crate::models::{NewUser, TokenPair, UserProfile};
use crate::services::email::{EmailSender, OutgoingEmail};
use crate::services::tokens::{TokenError, TokenService};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash checked when the email is unknown, so both login failures cost one
/// argon2 verification.
static DUMMY_PASSWORD_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("bazaar-dummy-password").ok());

/// Result of a successful signup or login.
#[derive(Debug)]
pub struct AuthOutcome {
    pub profile: UserProfile,
    pub tokens: TokenPair,
}

/// Result of a successful refresh.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub user_id: UserId,
    pub access_token: String,
}

/// Authentication service.
///
/// Borrowed from application state for the duration of a request.
pub struct AuthService<'a> {
    users: &'a dyn UserStore,
    tokens: &'a TokenService,
    mailer: &'a Arc<dyn EmailSender>,
    base_url: &'a str,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    ///
    /// `base_url` is the shop front end, used to build password reset links.
    #[must_use]
    pub const fn new(
        users: &'a dyn UserStore,
        tokens: &'a TokenService,
        mailer: &'a Arc<dyn EmailSender>,
        base_url: &'a str,
    ) -> Self {
        Self {
            users,
            tokens,
            mailer,
            base_url,
        }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Register a new customer and start a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::WeakPassword` or
    /// `AuthError::InvalidName` for bad input, and `AuthError::DuplicateEmail`
    /// if the email is already registered.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthOutcome, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidName);
        }

        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
                name: name.to_owned(),
                role: Role::Customer,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::DuplicateEmail,
                other => AuthError::Repository(other),
            })?;

        let tokens = self.start_session(user.id).await?;
        tracing::info!(user_id = %user.id, "User signed up");

        Ok(AuthOutcome {
            profile: user.profile(),
            tokens,
        })
    }

    /// Log in with email and password.
    ///
    /// A new login replaces any previous session of the same user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or
    /// malformed, or the password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            if let Some(hash) = DUMMY_PASSWORD_HASH.as_deref() {
                // Result is irrelevant; only the cost matters.
                let _ = verify_password(password, hash);
            }
            return Err(AuthError::InvalidCredentials);
        };

        verify_password(password, &user.password_hash)?;

        let tokens = self.start_session(user.id).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(AuthOutcome {
            profile: user.profile(),
            tokens,
        })
    }

    /// End the session a refresh token belongs to.
    ///
    /// Always succeeds: no token is a no-op, and a token that fails
    /// verification or a cache failure is only logged.
    ///
    /// # Errors
    ///
    /// Currently never fails.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        let Some(token) = refresh_token else {
            return Ok(());
        };

        match self.tokens.revoke_session(token).await {
            Ok(user_id) => tracing::info!(user_id = %user_id, "User logged out"),
            Err(TokenError::Cache(e)) => {
                tracing::error!(error = %e, "Failed to revoke session on logout");
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring unverifiable refresh token on logout"),
        }
        Ok(())
    }

    /// Mint a new access token from the caller's refresh token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` if no token was presented, or it
    /// is invalid, expired, or no longer the user's current one.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<RefreshOutcome, AuthError> {
        let token = refresh_token.ok_or(AuthError::Unauthenticated)?;
        let (user_id, access_token) = self.tokens.verify_and_rotate_access_token(token).await?;

        Ok(RefreshOutcome {
            user_id,
            access_token,
        })
    }

    /// The public profile of a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the user no longer exists.
    pub async fn profile(&self, user_id: UserId) -> Result<UserProfile, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        Ok(user.profile())
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    /// Email a password reset link if the account exists.
    ///
    /// Succeeds the same way whether or not the email is registered. The email
    /// is sent on a background task; delivery failures are logged.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed address.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = self.tokens.issue_password_reset_token(user.id)?;
        let reset_url = format!("{}/reset-password/{token}", self.base_url);
        let message = OutgoingEmail::password_reset(user.email, &reset_url);

        let mailer = Arc::clone(self.mailer);
        let user_id = user.id;
        tokio::spawn(async move {
            if let Err(e) = mailer.send(message).await {
                tracing::error!(user_id = %user_id, error = %e, "Failed to send password reset email");
            }
        });

        tracing::info!(user_id = %user.id, "Password reset requested");
        Ok(())
    }

    /// Set a new password using a reset token, and end the user's session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidOrExpiredToken` if the token does not
    /// verify, `AuthError::WeakPassword` for a short password, or
    /// `AuthError::NotFound` if the user no longer exists.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let user_id = self.tokens.verify_password_reset_token(token)?;
        validate_password(new_password)?;

        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        user.password_hash = hash_password(new_password)?;
        self.users.save(&user).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::NotFound,
            other => AuthError::Repository(other),
        })?;

        self.tokens.revoke_user_session(user_id).await?;
        tracing::info!(user_id = %user_id, "Password reset");
        Ok(())
    }

    async fn start_session(&self, user_id: UserId) -> Result<TokenPair, AuthError> {
        let tokens = self.tokens.issue_session_tokens(user_id)?;
        self.tokens
            .persist_refresh_token(user_id, &tokens.refresh_token)
            .await?;
        Ok(tokens)
    }
}

// =============================================================================
// Password Helpers
// =============================================================================

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::TimeDelta;
    use secrecy::SecretString;

    use super::*;
    use crate::cache::{MemorySessionCache, SessionCache};
    use crate::clock::ManualClock;
    use crate::config::TokenSecrets;
    use crate::db::memory::MemoryUserStore;
    use crate::services::email::RecordingEmailSender;

    const BASE_URL: &str = "https://shop.test";

    struct Fixture {
        users: MemoryUserStore,
        tokens: TokenService,
        cache: Arc<MemorySessionCache>,
        clock: ManualClock,
        outbox: Arc<RecordingEmailSender>,
        mailer: Arc<dyn EmailSender>,
    }

    impl Fixture {
        fn new() -> Self {
            let cache = Arc::new(MemorySessionCache::default());
            let clock = ManualClock::default();
            let secrets = TokenSecrets {
                access: SecretString::from("access-3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f"),
                refresh: SecretString::from("refresh-8f7e6d5c4b3a2f1e0d9c8b7a6f5e4d3c"),
                reset: SecretString::from("reset-5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c0d"),
            };
            let tokens = TokenService::new(&secrets, cache.clone(), Arc::new(clock.clone()));
            let outbox = Arc::new(RecordingEmailSender::new());
            Self {
                users: MemoryUserStore::new(),
                tokens,
                cache,
                clock,
                mailer: outbox.clone(),
                outbox,
            }
        }

        fn auth(&self) -> AuthService<'_> {
            AuthService::new(&self.users, &self.tokens, &self.mailer, BASE_URL)
        }
    }

    async fn next_reset_token(outbox: &RecordingEmailSender, count: usize) -> String {
        let sent = tokio::time::timeout(Duration::from_secs(5), outbox.wait_for(count))
            .await
            .unwrap();
        let body = &sent.last().unwrap().text_body;
        let start = body.find("/reset-password/").unwrap() + "/reset-password/".len();
        body[start..].split_whitespace().next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let fx = Fixture::new();
        let signup = fx
            .auth()
            .signup(" Ada@Shop.test ", "correct horse", "Ada")
            .await
            .unwrap();
        assert_eq!(signup.profile.email.as_str(), "ada@shop.test");
        assert_eq!(signup.profile.role, Role::Customer);

        let login = fx
            .auth()
            .login("ada@shop.test", "correct horse")
            .await
            .unwrap();
        assert_eq!(login.profile.id, signup.profile.id);

        let stored = fx.cache.get("refresh_token:1").await.unwrap();
        assert_eq!(stored.as_deref(), Some(login.tokens.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn test_signup_validates_input() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.auth().signup("nope", "password1", "A").await,
            Err(AuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            fx.auth().signup("a@shop.test", "short", "A").await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            fx.auth().signup("a@shop.test", "password1", "   ").await,
            Err(AuthError::InvalidName)
        ));
    }

    #[tokio::test]
    async fn test_signup_duplicate_email() {
        let fx = Fixture::new();
        fx.auth()
            .signup("a@shop.test", "password1", "A")
            .await
            .unwrap();
        assert!(matches!(
            fx.auth().signup("A@shop.test", "password2", "B").await,
            Err(AuthError::DuplicateEmail)
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let fx = Fixture::new();
        fx.auth()
            .signup("a@shop.test", "password1", "A")
            .await
            .unwrap();

        let unknown = fx.auth().login("b@shop.test", "password1").await.unwrap_err();
        let wrong = fx.auth().login("a@shop.test", "password2").await.unwrap_err();
        let malformed = fx.auth().login("not-an-email", "password1").await.unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(malformed, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_refresh_after_relogin_rejects_old_token() {
        let fx = Fixture::new();
        let first = fx
            .auth()
            .signup("a@shop.test", "password1", "A")
            .await
            .unwrap();
        let second = fx.auth().login("a@shop.test", "password1").await.unwrap();

        let refreshed = fx
            .auth()
            .refresh(Some(&second.tokens.refresh_token))
            .await
            .unwrap();
        assert_eq!(refreshed.user_id, second.profile.id);
        assert_eq!(
            fx.tokens.verify_access_token(&refreshed.access_token).unwrap(),
            second.profile.id
        );

        assert!(matches!(
            fx.auth().refresh(Some(&first.tokens.refresh_token)).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_refresh_without_token() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.auth().refresh(None).await,
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            fx.auth().refresh(Some("junk")).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh() {
        let fx = Fixture::new();
        let outcome = fx
            .auth()
            .signup("a@shop.test", "password1", "A")
            .await
            .unwrap();
        let token = outcome.tokens.refresh_token;

        fx.auth().logout(Some(&token)).await.unwrap();
        assert!(matches!(
            fx.auth().refresh(Some(&token)).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_logout_without_or_with_bad_token_succeeds() {
        let fx = Fixture::new();
        assert!(fx.auth().logout(None).await.is_ok());
        assert!(fx.auth().logout(Some("not.a.jwt")).await.is_ok());
    }

    #[tokio::test]
    async fn test_profile_of_missing_user() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.auth().profile(UserId::new(404)).await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_sends_nothing() {
        let fx = Fixture::new();
        fx.auth().forgot_password("ghost@shop.test").await.unwrap();
        tokio::task::yield_now().await;
        assert!(fx.outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let fx = Fixture::new();
        let session = fx
            .auth()
            .signup("a@shop.test", "password1", "A")
            .await
            .unwrap();

        fx.auth().forgot_password("a@shop.test").await.unwrap();
        let token = next_reset_token(&fx.outbox, 1).await;
        assert!(fx.outbox.sent()[0].text_body.contains(BASE_URL));

        fx.auth().reset_password(&token, "new-password").await.unwrap();

        // Old password no longer works, the new one does.
        assert!(matches!(
            fx.auth().login("a@shop.test", "password1").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(fx.auth().login("a@shop.test", "new-password").await.is_ok());

        // The session that existed before the reset is gone.
        assert!(matches!(
            fx.auth().refresh(Some(&session.tokens.refresh_token)).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_reset_token_expires() {
        let fx = Fixture::new();
        fx.auth()
            .signup("a@shop.test", "password1", "A")
            .await
            .unwrap();
        fx.auth().forgot_password("a@shop.test").await.unwrap();
        let token = next_reset_token(&fx.outbox, 1).await;

        fx.clock.advance(TimeDelta::minutes(16));
        assert!(matches!(
            fx.auth().reset_password(&token, "new-password").await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn test_reset_rejects_weak_password() {
        let fx = Fixture::new();
        fx.auth()
            .signup("a@shop.test", "password1", "A")
            .await
            .unwrap();
        fx.auth().forgot_password("a@shop.test").await.unwrap();
        let token = next_reset_token(&fx.outbox, 1).await;

        assert!(matches!(
            fx.auth().reset_password(&token, "short").await,
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(verify_password("wrong horse", &hash).is_err());
        assert!(verify_password("anything", "not a phc string").is_err());
    }

    #[test]
    fn test_dummy_hash_costs_the_same_as_a_real_one() {
        let dummy = DUMMY_PASSWORD_HASH.as_deref().unwrap();
        let real = hash_password("correct horse").unwrap();

        let dummy = PasswordHash::new(dummy).unwrap();
        let real = PasswordHash::new(&real).unwrap();
        assert_eq!(dummy.algorithm, real.algorithm);
        assert_eq!(dummy.version, real.version);
        assert_eq!(dummy.params, real.params);
        assert!(verify_password("correct horse", &dummy.to_string()).is_err());
    }
}
