//! Counter stores backing the rate limiter

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::Result;

/// Counter value after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    /// Requests counted in the current window, this one included
    pub count: u64,
    /// Whole seconds until the window resets, rounded up
    pub reset_secs: u64,
}

/// Shared store of fixed-window counters
///
/// `increment_with_expiry` must be indivisible: create the counter with the
/// given TTL when no live one exists, increment it, and report the new count
/// and remaining TTL, with no other caller interleaving.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter under `key`, starting a `ttl` window if needed
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<CounterState>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    expires_at: Instant,
}

/// Sweep expired windows after this many increments
const SWEEP_INTERVAL: u64 = 1024;

/// Process-local counter store
///
/// Suitable for a single instance and for tests; counters are not shared
/// between processes. Uses the tokio clock, so paused-time tests can expire
/// windows with `tokio::time::advance`.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, Window>,
    increments: AtomicU64,
}

impl MemoryCounterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every window that has expired
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.windows.retain(|_, window| window.expires_at > now);
    }

    /// Number of tracked windows, expired ones included
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no windows are tracked
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn increment(&self, key: &str, ttl: Duration) -> CounterState {
        let now = Instant::now();

        let state = {
            // the entry guard holds the shard lock for the whole update
            let mut window = self.windows.entry(key.to_string()).or_insert(Window {
                count: 0,
                expires_at: now + ttl,
            });
            if window.expires_at <= now {
                *window = Window {
                    count: 0,
                    expires_at: now + ttl,
                };
            }
            window.count += 1;

            CounterState {
                count: window.count,
                reset_secs: ceil_secs(window.expires_at.saturating_duration_since(now)),
            }
        };

        if self.increments.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.purge_expired();
        }

        state
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<CounterState> {
        Ok(self.increment(key, ttl))
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
