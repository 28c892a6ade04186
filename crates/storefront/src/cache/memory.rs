//! In-process session cache.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;

use super::{CacheError, SessionCache};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Option<Duration>,
}

/// Every write restarts the entry's lifetime from its own TTL.
struct EntryExpiry;

impl moka::Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Session cache kept in this process's memory.
///
/// Used when `REDIS_URL` is not set, and in tests. Entries are lost on
/// restart, which signs every user out.
///
/// Unbounded: an entry leaves only when its TTL runs out or it is deleted,
/// so a live refresh token is never evicted under load.
#[derive(Clone)]
pub struct MemorySessionCache {
    entries: Cache<String, Entry>,
}

impl MemorySessionCache {
    #[must_use]
    pub fn new() -> Self {
        let entries = Cache::builder().expire_after(EntryExpiry).build();
        Self { entries }
    }
}

impl Default for MemorySessionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.entries
            .insert(
                key.to_owned(),
                Entry {
                    value: value.to_owned(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).await.map(|entry| entry.value))
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
