//! Application wiring over in-memory backends, for tests.
//!
//! Enabled by the `test-support` feature.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::Router;
use secrecy::SecretString;

use bazaar_core::{Email, Role};

use crate::cache::MemorySessionCache;
use crate::clock::ManualClock;
use crate::config::{StorefrontConfig, TokenSecrets};
use crate::db::UserStore;
use crate::db::memory::{MemoryProductStore, MemoryUserStore};
use crate::services::email::RecordingEmailSender;
use crate::state::{AppState, Backends};

/// Token secrets that pass validation, distinct per token kind.
#[must_use]
pub fn test_secrets() -> TokenSecrets {
    TokenSecrets {
        access: SecretString::from("test-access-Kq8vN3xR7mW2pL9tY4bH6cJ1"),
        refresh: SecretString::from("test-refresh-Zt5gD8sA2fQ7wE4rU9iO3pL6"),
        reset: SecretString::from("test-reset-Mx3nB6vC9zX2lK5jH8gF1dS4"),
    }
}

/// Configuration for a plain-http server with rate limiting off.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused@localhost/bazaar_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://shop.test".to_string(),
        rate_limit: false,
        tokens: test_secrets(),
        redis: None,
        email: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A fully wired application with handles on its backends.
pub struct TestApp {
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub products: Arc<MemoryProductStore>,
    pub cache: Arc<MemorySessionCache>,
    pub mailer: Arc<RecordingEmailSender>,
    pub clock: ManualClock,
}

impl TestApp {
    /// Wire the application with [`test_config`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Wire the application with a custom configuration.
    #[must_use]
    pub fn with_config(config: StorefrontConfig) -> Self {
        let users = Arc::new(MemoryUserStore::new());
        let products = Arc::new(MemoryProductStore::new());
        let cache = Arc::new(MemorySessionCache::default());
        let mailer = Arc::new(RecordingEmailSender::new());
        let clock = ManualClock::default();

        let state = AppState::new(
            config,
            Backends {
                users: users.clone(),
                products: products.clone(),
                cache: cache.clone(),
                mailer: mailer.clone(),
                clock: Arc::new(clock.clone()),
            },
        );

        Self {
            state,
            users,
            products,
            cache,
            mailer,
            clock,
        }
    }

    /// The application router, as served.
    #[must_use]
    pub fn router(&self) -> Router {
        crate::routes::app(self.state.clone())
    }

    /// Give an existing account the admin role.
    ///
    /// # Panics
    ///
    /// Panics if the email is malformed or not registered.
    #[allow(clippy::expect_used)]
    pub async fn promote_to_admin(&self, email: &str) {
        let email = Email::parse(email).expect("valid email");
        let mut user = self
            .users
            .find_by_email(&email)
            .await
            .expect("store available")
            .expect("user registered");
        user.role = Role::Admin;
        self.users.save(&user).await.expect("user saved");
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
