//! Application state shared across handlers.

use std::sync::Arc;

use crate::cache::SessionCache;
use crate::clock::Clock;
use crate::config::StorefrontConfig;
use crate::db::{ProductStore, UserStore};
use crate::services::auth::AuthService;
use crate::services::catalog::CatalogService;
use crate::services::email::EmailSender;
use crate::services::tokens::TokenService;

/// External collaborators the application is wired to.
pub struct Backends {
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub cache: Arc<dyn SessionCache>,
    pub mailer: Arc<dyn EmailSender>,
    pub clock: Arc<dyn Clock>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the stores, the session cache and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    users: Arc<dyn UserStore>,
    products: Arc<dyn ProductStore>,
    cache: Arc<dyn SessionCache>,
    mailer: Arc<dyn EmailSender>,
    tokens: TokenService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The token service is built from the secrets in `config`.
    #[must_use]
    pub fn new(config: StorefrontConfig, backends: Backends) -> Self {
        let tokens = TokenService::new(&config.tokens, Arc::clone(&backends.cache), backends.clock);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                users: backends.users,
                products: backends.products,
                cache: backends.cache,
                mailer: backends.mailer,
                tokens,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the user store.
    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.users.as_ref()
    }

    /// Get a reference to the product store.
    #[must_use]
    pub fn products(&self) -> &dyn ProductStore {
        self.inner.products.as_ref()
    }

    /// Get a reference to the session cache.
    #[must_use]
    pub fn cache(&self) -> &dyn SessionCache {
        self.inner.cache.as_ref()
    }

    /// Get a reference to the token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// The authentication service for this request.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(
            self.users(),
            &self.inner.tokens,
            &self.inner.mailer,
            &self.inner.config.base_url,
        )
    }

    /// The catalog service for this request.
    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self.products(), self.cache())
    }
}
