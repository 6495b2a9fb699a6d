pub mod cache;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod service;

pub use cache::{CacheBackend, CacheError, CacheStore};
pub use config::{AppConfig, CacheConfig, LoggingConfig, RedisConfig, ServerConfig, SourceConfig};
pub use observability::init_tracing;
pub use server::{AppState, RosterServer, ServerBuilder, build_app};
pub use service::{RosterOrigin, RosterResponse, RosterService, ServiceError};

/// Create a cache backend based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: Returns local-only cache (DashMap)
/// - **Redis enabled**: Builds a bounded Redis pool
///
/// ## Graceful Degradation
///
/// A pool that cannot be created (bad URL) falls back to local mode. A Redis
/// server that is merely unreachable keeps the Redis backend: requests load
/// from the source until it comes back.
pub async fn create_cache_backend(config: &RedisConfig) -> CacheBackend {
    use std::time::Duration;

    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    // Create Redis pool configuration
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);
    redis_config.pool = Some(pool_config);

    // Create pool
    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return CacheBackend::new_local();
        }
    };

    // Test connection
    match pool.get().await {
        Ok(_) => tracing::info!("Connected to Redis"),
        Err(e) => tracing::warn!(
            error = %e,
            "Redis not reachable yet. Requests will load from source until it is."
        ),
    }

    CacheBackend::new_redis(pool)
}
