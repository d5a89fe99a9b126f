//! Key/value cache module
//!
//! This module provides the [`KeyValueStore`] abstraction used for
//! server-side session state, with a Redis implementation for deployments and
//! an in-process implementation for tests and single-node runs.

use anyhow::Result;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{CacheError, CacheResult};

/// String key/value storage with optional per-key expiry
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set a key-value pair with optional TTL
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()>;

    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if the store is reachable
    async fn health_check(&self) -> Result<bool>;
}

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        Ok(RedisConfig { url })
    }
}

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis connection pool
    ///
    /// Only the URL is checked here; connections are opened per command.
    pub async fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.clone()).map_err(|source| CacheError::InvalidUrl {
            url: config.url.clone(),
            source,
        })?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    /// Get a connection from the pool
    async fn get_connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(CacheError::Connection)
    }
}

#[async_trait]
impl KeyValueStore for RedisPool {
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.get_connection().await?;

        if let Some(ttl) = ttl_seconds {
            let _: () = conn.set_ex(key, value, ttl).await?;
        } else {
            let _: () = conn.set(key, value).await?;
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = conn.del(key).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[derive(Debug)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-process key/value store
///
/// Expired entries are dropped lazily when read.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries
            .values()
            .filter(|entry| entry.expires_at.is_none_or(|at| at > now))
            .count()
    }

    /// True when no live entries remain
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let expires_at = ttl_seconds.map(|ttl| Instant::now() + Duration::from_secs(ttl));
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some(entry) => entry.expires_at.is_some_and(|at| at <= Instant::now()),
            None => return Ok(None),
        };

        if expired {
            entries.remove(key);
            return Ok(None);
        }

        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_set_get_delete() -> Result<()> {
        let cache = MemoryCache::new();

        cache.set("session:a", "payload", None).await?;
        assert_eq!(cache.get("session:a").await?, Some("payload".to_string()));

        cache.delete("session:a").await?;
        assert_eq!(cache.get("session:a").await?, None);

        // deleting twice is fine
        cache.delete("session:a").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_entry_expires() -> Result<()> {
        let cache = MemoryCache::new();

        cache.set("short", "gone", Some(0)).await?;
        cache.set("long", "kept", Some(3600)).await?;

        assert_eq!(cache.get("short").await?, None);
        assert_eq!(cache.get("long").await?, Some("kept".to_string()));
        assert_eq!(cache.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_overwrite_replaces_value() -> Result<()> {
        let cache = MemoryCache::new();

        cache.set("k", "one", None).await?;
        cache.set("k", "two", None).await?;

        assert_eq!(cache.get("k").await?, Some("two".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_redis_rejects_malformed_url() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
        };

        let result = RedisPool::new(&config).await;
        assert!(matches!(result, Err(CacheError::InvalidUrl { .. })));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_redis_set_get_delete() -> Result<()> {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
        };

        let pool = RedisPool::new(&config).await?;
        assert!(pool.health_check().await?);

        let key = "test_key";
        let value = "test_value";
        pool.set(key, value, Some(5)).await?;

        let retrieved = pool.get(key).await?;
        assert_eq!(retrieved, Some(value.to_string()));

        pool.delete(key).await?;
        let retrieved = pool.get(key).await?;
        assert_eq!(retrieved, None);

        Ok(())
    }
}
