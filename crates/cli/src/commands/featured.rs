//! Featured products cache commands.
//!
//! # Usage
//!
//! ```bash
//! bazaar-cli featured rebuild
//! ```
//!
//! # Environment Variables
//!
//! - `REDIS_URL` - Redis the API server caches into

use bazaar_storefront::cache::{RedisSessionCache, SessionCache};
use bazaar_storefront::config::RedisConfig;
use bazaar_storefront::db::PgProductStore;
use bazaar_storefront::services::catalog::FeaturedProducts;
use secrecy::SecretString;

use super::{CommandError, connect, env_var};

/// Connect to the Redis instance the server uses.
pub(super) fn redis_cache() -> Result<RedisSessionCache, CommandError> {
    let url = env_var("REDIS_URL").ok_or(CommandError::MissingEnvVar("REDIS_URL"))?;
    let config = RedisConfig {
        url: SecretString::from(url),
        pool_size: 1,
    };
    RedisSessionCache::connect(&config).map_err(|e| CommandError::CachePool(e.to_string()))
}

/// Recompute the featured list from the database and overwrite the cache.
///
/// # Errors
///
/// Returns `CommandError` if a backend is unreachable or the entry could
/// not be written.
pub async fn rebuild() -> Result<(), CommandError> {
    let products = PgProductStore::new(connect().await?);
    let cache = redis_cache()?;
    cache.ping().await?;

    let featured = FeaturedProducts::new(&products, &cache).rebuild().await?;
    tracing::info!(count = featured.len(), "Featured products cache rebuilt");
    Ok(())
}
