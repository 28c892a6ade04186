//! Database operations for the shop `PostgreSQL`.
//!
//! ## Tables
//!
//! - `users` - Shop accounts (email, argon2 password hash, role)
//! - `products` - The catalog, including the `is_featured` flag
//!
//! Services reach storage through the [`UserStore`] and [`ProductStore`]
//! traits. `PostgreSQL` implementations live here; in-memory ones are behind
//! the `test-support` feature.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p bazaar-cli -- migrate
//! ```

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod products;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use bazaar_core::{Email, ProductId, UserId};

use crate::models::{NewProduct, NewUser, Product, User};

pub use products::PgProductStore;
pub use users::PgUserStore;

/// Embedded migrations from `crates/storefront/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Persistence of shop accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by normalized email.
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Look up a user by ID.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Insert a user.
    ///
    /// Returns [`RepositoryError::Conflict`] if the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Write back a modified user (password hash, name, role).
    ///
    /// Returns [`RepositoryError::NotFound`] if the user no longer exists.
    async fn save(&self, user: &User) -> Result<User, RepositoryError>;

    /// Check the database is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Persistence of catalog products.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All products, ordered by ID.
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Products with `is_featured` set, ordered by ID.
    async fn list_featured(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Look up a product by ID.
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Insert a product.
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Write back a modified product.
    ///
    /// Returns [`RepositoryError::NotFound`] if the product no longer exists.
    async fn save(&self, product: &Product) -> Result<Product, RepositoryError>;

    /// Delete a product, returning the removed record if it existed.
    async fn delete(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
fn conflict_on_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}
