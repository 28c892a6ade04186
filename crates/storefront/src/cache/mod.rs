//! Session cache: a small key-value store with optional per-key TTL.
//!
//! Holds two kinds of entries:
//!
//! - `refresh_token:<userId>` - the one live refresh token of a user (7 day TTL)
//! - `featured_products` - JSON snapshot of the featured catalog (no TTL)
//!
//! Backed by Redis in production ([`RedisSessionCache`]) or by an in-process
//! moka cache ([`MemorySessionCache`]) when no Redis URL is configured.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use bazaar_core::UserId;

pub use memory::MemorySessionCache;
pub use redis::RedisSessionCache;

/// Key of the featured-products snapshot.
pub const FEATURED_PRODUCTS_KEY: &str = "featured_products";

/// Key holding the live refresh token of a user.
#[must_use]
pub fn refresh_token_key(user_id: UserId) -> String {
    format!("refresh_token:{user_id}")
}

/// Errors from the session cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No connection could be taken from the pool.
    #[error("cache pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// The Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    /// A cached value could not be (de)serialized.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value operations the services need from a cache.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// With `ttl` the entry disappears after that long; without it the entry
    /// lives until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Fetch the value under `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_token_key() {
        assert_eq!(refresh_token_key(UserId::new(42)), "refresh_token:42");
    }
}
