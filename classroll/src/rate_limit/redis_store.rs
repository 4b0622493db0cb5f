//! Redis-backed counter store
//!
//! Counters live in Redis so every instance of a service shares the same
//! windows. Increment, expiry and TTL read happen in one Lua script, which
//! Redis runs atomically.

use std::ops::DerefMut;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool as RedisPool;
use redis::Script;

use super::store::{CounterState, CounterStore};
use crate::error::Result;

/// INCR, start the window when the key has no TTL yet, then read the TTL
const INCREMENT_SCRIPT: &str = r"
local count = redis.call('INCR', KEYS[1])
if redis.call('TTL', KEYS[1]) < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return {count, redis.call('TTL', KEYS[1])}
";

/// Counter store shared through Redis
#[derive(Clone)]
pub struct RedisCounterStore {
    pool: RedisPool,
    script: Script,
    prefix: String,
}

impl RedisCounterStore {
    /// Create a store over an existing pool
    ///
    /// Keys are written as `ratelimit:{key}`.
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            script: Script::new(INCREMENT_SCRIPT),
            prefix: "ratelimit:".to_string(),
        }
    }

    /// Use a different key prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<CounterState> {
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.pool.get().await?;

        let (count, remaining): (i64, i64) = self
            .script
            .key(self.redis_key(key))
            .arg(ttl_secs)
            .invoke_async(conn.deref_mut())
            .await?;

        // a TTL that vanished between calls means the window just ended
        let reset_secs = if remaining > 0 {
            remaining as u64
        } else {
            ttl_secs
        };

        Ok(CounterState {
            count: count.max(0) as u64,
            reset_secs,
        })
    }
}
