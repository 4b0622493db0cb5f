//! Redis connection pool for the shared rate-limit counters

use std::time::Duration;

use deadpool_redis::{Config as DeadpoolConfig, Pool, Runtime};

use crate::{
    config::RedisConfig,
    error::{Error, Result},
    retry::with_backoff,
};

/// Create a Redis pool, retrying with exponential backoff
///
/// A connection is checked out once so an unreachable server fails here
/// rather than on the first rate-limited request.
pub async fn create_pool(config: &RedisConfig) -> Result<Pool> {
    let pool = with_backoff(
        "Redis",
        config.max_retries,
        Duration::from_secs(config.retry_delay_secs),
        || try_create_pool(config),
    )
    .await?;

    tracing::info!(
        "Redis connection pool created: max_connections={}",
        config.max_connections
    );
    Ok(pool)
}

async fn try_create_pool(config: &RedisConfig) -> Result<Pool> {
    let pool = build_pool(config)?;
    drop(pool.get().await?);
    Ok(pool)
}

fn build_pool(config: &RedisConfig) -> Result<Pool> {
    DeadpoolConfig::from_url(&config.url)
        .builder()
        .map_err(|e| Error::Internal(format!("Failed to build Redis pool: {}", e)))?
        .max_size(config.max_connections)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create Redis pool: {}", e)))
}
