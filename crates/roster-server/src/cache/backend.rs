//! Cache store capability and its Local/Redis backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache command failed: {0}")]
    Command(#[from] redis::RedisError),
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}

/// Opaque key-value store consumed by the roster service.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `Ok(None)` on a miss. Hits are shared, not copied.
    async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError>;

    /// Store a value with no expiry.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;

    /// Whether the store can currently be reached (for readiness checks).
    async fn is_available(&self) -> bool;

    /// Short backend label, e.g. "local" or "redis".
    fn mode(&self) -> &'static str;
}

#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: local DashMap only
    Local(Arc<DashMap<String, Arc<Vec<u8>>>>),

    /// Multi-instance: shared Redis
    Redis(Pool),
}

impl CacheBackend {
    /// Create a new local-only cache backend.
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    /// Create a new Redis-backed cache backend.
    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis(redis_pool)
    }

    /// Remove an entry. Entries never expire on their own, so this is the
    /// only way to force the next request to reload the source.
    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.remove(key);
                tracing::debug!(key = %key, "cache invalidated (local)");
                Ok(())
            }
            CacheBackend::Redis(redis) => {
                let mut conn = redis.get().await?;
                conn.del::<_, ()>(key).await?;
                tracing::debug!(key = %key, "cache invalidated (redis)");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl CacheStore for CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
        match self {
            CacheBackend::Local(map) => Ok(map.get(key).map(|entry| Arc::clone(entry.value()))),
            CacheBackend::Redis(redis) => {
                let mut conn = redis.get().await?;
                let value = conn.get::<_, Option<Vec<u8>>>(key).await?;
                Ok(value.map(Arc::new))
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), Arc::new(value));
                Ok(())
            }
            CacheBackend::Redis(redis) => {
                let mut conn = redis.get().await?;
                conn.set::<_, _, ()>(key, value).await?;
                Ok(())
            }
        }
    }

    async fn is_available(&self) -> bool {
        match self {
            CacheBackend::Local(_) => true,
            CacheBackend::Redis(redis) => redis.get().await.is_ok(),
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            CacheBackend::Local(_) => "local",
            CacheBackend::Redis(_) => "redis",
        }
    }
}
