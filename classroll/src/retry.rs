//! Exponential backoff for startup connections

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Run `connect` until it succeeds or `max_retries` retries are spent
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`. The last
/// error is returned when every attempt fails.
pub(crate) async fn with_backoff<T, F, Fut>(
    target: &str,
    max_retries: u32,
    base_delay: Duration,
    mut connect: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        match connect().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!("{} connection established after {} attempt(s)", target, attempt + 1);
                }
                return Ok(value);
            }
            Err(e) => {
                attempt += 1;

                if attempt > max_retries {
                    tracing::error!(
                        "Failed to connect to {} after {} attempts: {}",
                        target,
                        attempt,
                        e
                    );
                    return Err(e);
                }

                let delay = base_delay.saturating_mul(2_u32.saturating_pow(attempt - 1));
                tracing::warn!(
                    "{} connection attempt {} failed: {}. Retrying in {:?}...",
                    target,
                    attempt,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}
