//! Fixed-window rate limiting
//!
//! Each `(operation, caller)` pair gets its own counter, keyed
//! `{operation}/{caller}`. The first request of a window starts a counter that
//! expires after the configured period; requests beyond the limit are answered
//! with `429 Too Many Requests` without reaching the handler.
//!
//! Every limited response carries the quota headers:
//!
//! - `X-RateLimit-Limit`: requests allowed per window
//! - `X-RateLimit-Remaining`: requests left in the current window
//! - `X-RateLimit-Reset`: seconds until the window resets
//!
//! When the counter store cannot be reached the request is let through
//! without headers.

#[cfg(feature = "cache")]
mod redis_store;
mod store;

#[cfg(feature = "cache")]
pub use redis_store::RedisCounterStore;
pub use store::{CounterState, CounterStore, MemoryCounterStore};

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{config::RateLimitConfig, error::{Error, Result}};

/// `X-RateLimit-Limit`
pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// `X-RateLimit-Remaining`
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// `X-RateLimit-Reset`
pub const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Identity rate limits are counted against
///
/// Installed as a request extension by whatever authenticates the caller;
/// requests without one are counted as `anonymous`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller(pub String);

impl Caller {
    /// Identity used when no caller was established
    pub const ANONYMOUS: &'static str = "anonymous";
}

/// Outcome of one rate limit check
///
/// Also available to handlers as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests allowed per window
    pub limit: u32,
    /// Requests left in the window, never negative
    pub remaining: u32,
    /// Seconds until the window resets
    pub reset_secs: u64,
}

impl RateLimitDecision {
    /// Quota headers for this decision
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(3);
        self.apply_headers(&mut headers);
        headers
    }

    /// Insert the quota headers into `headers`, replacing existing ones
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(REMAINING_HEADER, HeaderValue::from(self.remaining));
        headers.insert(LIMIT_HEADER, HeaderValue::from(self.limit));
        headers.insert(RESET_HEADER, HeaderValue::from(self.reset_secs));
    }
}

/// Rate limiter over a shared counter store
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter over `store`
    pub fn new(store: impl CounterStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Create a limiter with process-local counters
    pub fn in_memory() -> Self {
        Self::new(MemoryCounterStore::new())
    }

    /// Count one request against `key`
    ///
    /// Store failures are returned to the caller; the middleware turns them
    /// into a fail-open pass.
    pub async fn check(&self, key: &str, limit: u32, period: Duration) -> Result<RateLimitDecision> {
        let state = self.store.increment_with_expiry(key, period).await?;

        let count = u32::try_from(state.count).unwrap_or(u32::MAX);
        Ok(RateLimitDecision {
            allowed: count <= limit,
            limit,
            remaining: limit.saturating_sub(count),
            reset_secs: state.reset_secs,
        })
    }
}

/// Rate limiting middleware state for one operation
///
/// ```rust,ignore
/// let layer = from_fn_with_state(
///     RateLimit::new(limiter, "get_students", 5, Duration::from_secs(15)),
///     RateLimit::middleware,
/// );
/// ```
#[derive(Debug, Clone)]
pub struct RateLimit {
    limiter: Option<RateLimiter>,
    operation: Arc<str>,
    limit: u32,
    period: Duration,
}

impl RateLimit {
    /// Limit `operation` to `limit` requests per `period` per caller
    pub fn new(limiter: RateLimiter, operation: impl Into<Arc<str>>, limit: u32, period: Duration) -> Self {
        Self {
            limiter: Some(limiter),
            operation: operation.into(),
            limit,
            period,
        }
    }

    /// Limit `operation` as configured; disabled config or no limiter lets
    /// every request through
    pub fn from_config(
        config: &RateLimitConfig,
        limiter: Option<RateLimiter>,
        operation: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            limiter: limiter.filter(|_| config.enabled),
            operation: operation.into(),
            limit: config.limit,
            period: config.period(),
        }
    }

    /// Operation name the counters are keyed by
    pub fn operation(&self) -> &str {
        &self.operation
    }

    fn key(&self, request: &Request) -> String {
        let caller = request
            .extensions()
            .get::<Caller>()
            .map(|caller| caller.0.as_str())
            .unwrap_or(Caller::ANONYMOUS);
        format!("{}/{}", self.operation, caller)
    }

    /// Middleware function enforcing the limit
    pub async fn middleware(State(rate_limit): State<Self>, mut request: Request, next: Next) -> Response {
        let Some(limiter) = rate_limit.limiter.as_ref() else {
            return next.run(request).await;
        };

        let key = rate_limit.key(&request);
        let decision = match limiter.check(&key, rate_limit.limit, rate_limit.period).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!("Rate limit store unavailable for {}, allowing request: {}", key, e);
                return next.run(request).await;
            }
        };

        let mut response = if decision.allowed {
            request.extensions_mut().insert(decision);
            next.run(request).await
        } else {
            tracing::warn!(
                "Rate limit exceeded for {}: limit {} per {:?}",
                key,
                decision.limit,
                rate_limit.period
            );
            Error::RateLimitExceeded.into_response()
        };

        decision.apply_headers(response.headers_mut());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RATE_LIMIT_MESSAGE;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        middleware::from_fn_with_state,
        routing::get,
        Extension, Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    const PERIOD: Duration = Duration::from_secs(15);

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn increment_with_expiry(&self, _key: &str, _ttl: Duration) -> Result<CounterState> {
            Err(Error::Internal("store offline".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_per_window_sequence() {
        let limiter = RateLimiter::in_memory();

        let mut remaining = Vec::new();
        for _ in 0..5 {
            let decision = limiter.check("get_students/1", 5, PERIOD).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.reset_secs, 15);
            remaining.push(decision.remaining);
        }
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        let rejected = limiter.check("get_students/1", 5, PERIOD).await.unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);

        tokio::time::advance(PERIOD).await;
        let fresh = limiter.check("get_students/1", 5, PERIOD).await.unwrap();
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 4);
    }

    #[tokio::test]
    async fn test_keys_do_not_share_counters() {
        let limiter = RateLimiter::in_memory();
        for _ in 0..6 {
            limiter.check("get_students/1", 5, PERIOD).await.unwrap();
        }
        assert!(limiter.check("get_students/2", 5, PERIOD).await.unwrap().allowed);
        assert!(limiter.check("get_classes/1", 5, PERIOD).await.unwrap().allowed);
    }

    #[test]
    fn test_decision_headers() {
        let decision = RateLimitDecision {
            allowed: true,
            limit: 5,
            remaining: 2,
            reset_secs: 9,
        };
        let headers = decision.headers();
        assert_eq!(headers["x-ratelimit-limit"], "5");
        assert_eq!(headers["x-ratelimit-remaining"], "2");
        assert_eq!(headers["x-ratelimit-reset"], "9");
    }

    fn app(rate_limit: RateLimit) -> Router {
        Router::new()
            .route(
                "/students",
                get(|Extension(decision): Extension<RateLimitDecision>| async move {
                    decision.remaining.to_string()
                }),
            )
            .route_layer(from_fn_with_state(rate_limit, RateLimit::middleware))
    }

    async fn send(app: &Router, caller: Option<&str>) -> Response {
        let mut request = axum::http::Request::builder()
            .uri("/students")
            .body(Body::empty())
            .unwrap();
        if let Some(caller) = caller {
            request.extensions_mut().insert(Caller(caller.to_string()));
        }
        app.clone().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_middleware_rejects_over_limit() {
        let app = app(RateLimit::new(RateLimiter::in_memory(), "get_students", 2, PERIOD));

        let response = send(&app, Some("1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "1");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"1");

        send(&app, Some("1")).await;
        let response = send(&app, Some("1")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            json!({"status": 429, "error": "too many requests", "message": RATE_LIMIT_MESSAGE})
        );

        // another caller has its own window, as does the anonymous one
        assert_eq!(send(&app, Some("2")).await.status(), StatusCode::OK);
        assert_eq!(send(&app, None).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let rate_limit = RateLimit::new(RateLimiter::new(BrokenStore), "get_students", 1, PERIOD);
        let app = Router::new()
            .route("/students", get(|| async { "ok" }))
            .route_layer(from_fn_with_state(rate_limit, RateLimit::middleware));

        for _ in 0..3 {
            let request = axum::http::Request::builder()
                .uri("/students")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get("x-ratelimit-limit").is_none());
        }
    }

    #[tokio::test]
    async fn test_disabled_config_skips_limiting() {
        let config = RateLimitConfig {
            enabled: false,
            limit: 0,
            period_secs: 15,
        };
        let rate_limit = RateLimit::from_config(&config, Some(RateLimiter::in_memory()), "get_students");
        let app = Router::new()
            .route("/students", get(|| async { "ok" }))
            .route_layer(from_fn_with_state(rate_limit, RateLimit::middleware));

        let request = axum::http::Request::builder()
            .uri("/students")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-remaining").is_none());
    }
}
