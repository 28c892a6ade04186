//! CLI subcommand implementations.

pub mod featured;
pub mod migrate;
pub mod user;

use secrecy::SecretString;
use thiserror::Error;

/// Errors shared by the subcommands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Invalid command-line argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Store operation error.
    #[error("Repository error: {0}")]
    Repository(#[from] bazaar_storefront::db::RepositoryError),

    /// Catalog operation error.
    #[error("Catalog error: {0}")]
    Catalog(#[from] bazaar_storefront::services::catalog::CatalogError),

    /// Session cache error.
    #[error("Cache error: {0}")]
    Cache(#[from] bazaar_storefront::cache::CacheError),

    /// Session cache could not be set up.
    #[error("Cache pool error: {0}")]
    CachePool(String),
}

/// Read an environment variable, loading `.env` first.
fn env_var(name: &'static str) -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Database URL from `BAZAAR_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    env_var("BAZAAR_DATABASE_URL")
        .or_else(|| env_var("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or(CommandError::MissingEnvVar("BAZAAR_DATABASE_URL"))
}

async fn connect() -> Result<sqlx::PgPool, CommandError> {
    tracing::info!("Connecting to database...");
    Ok(bazaar_storefront::db::create_pool(&database_url()?).await?)
}
