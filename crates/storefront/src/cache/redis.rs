//! Redis-backed session cache.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use secrecy::ExposeSecret;

use super::{CacheError, SessionCache};
use crate::config::RedisConfig;

/// Session cache stored in Redis.
///
/// Shared by every server instance, so sessions survive restarts and
/// load-balanced requests.
#[derive(Clone)]
pub struct RedisSessionCache {
    pool: Pool,
}

impl RedisSessionCache {
    /// Build a connection pool from configuration.
    ///
    /// Connections are opened lazily; call [`SessionCache::ping`] to check
    /// the server is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the pool cannot be built.
    pub fn connect(config: &RedisConfig) -> Result<Self, deadpool_redis::CreatePoolError> {
        let mut pool_config = deadpool_redis::Config::from_url(config.url.expose_secret());
        pool_config.pool = Some(PoolConfig::new(config.pool_size));
        let pool = pool_config.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        match ttl {
            Some(ttl) => {
                conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                    .await?;
            }
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.pool.get().await?;
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        deadpool_redis::redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}
