use classroll::{cache, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_for_service("classroll-api")?;
    init_tracing(&config)?;

    let limiter = rate_limiter(&config).await?;
    let pipeline = Pipeline::new(config.rate_limit.clone(), Some(limiter));
    let state = classroll_api::AppState::new(config.collections.default_max_per_page);
    let app = classroll_api::router(state, &pipeline)?;

    Server::new(config).serve(app).await?;
    Ok(())
}

/// Counter store for the rate limiter
///
/// Redis when configured; process memory when it is not, or when an optional
/// Redis cannot be reached at startup.
async fn rate_limiter(config: &Config) -> anyhow::Result<RateLimiter> {
    let Some(redis) = &config.redis else {
        info!("No Redis configured, keeping rate limit counters in memory");
        return Ok(RateLimiter::in_memory());
    };

    match cache::create_pool(redis).await {
        Ok(pool) => {
            info!("Keeping rate limit counters in Redis");
            Ok(RateLimiter::new(RedisCounterStore::new(pool)))
        }
        Err(e) if redis.optional => {
            warn!(
                "Redis unavailable ({}), keeping rate limit counters in memory",
                e
            );
            Ok(RateLimiter::in_memory())
        }
        Err(e) => Err(e.into()),
    }
}
