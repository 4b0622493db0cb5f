//! Route builders applying the cross-cutting request pipeline
//!
//! Read routes run `rate limit -> handler -> conditional cache`; write routes
//! run `rate limit -> handler`, the handler producing an [`ApiResponse`].
//! Authentication, when a service has it, is layered outside these routes and
//! installs the [`Caller`] the rate limiter keys on.
//!
//! ```rust,ignore
//! let pipeline = Pipeline::new(config.rate_limit.clone(), Some(RateLimiter::in_memory()));
//!
//! let app = Router::new().route(
//!     "/v1/students/",
//!     pipeline
//!         .read("get_students", Method::GET, list_students)?
//!         .merge(pipeline.write("new_student", Method::POST, new_student)?),
//! );
//! ```
//!
//! [`ApiResponse`]: crate::responses::ApiResponse
//! [`Caller`]: crate::rate_limit::Caller

use std::time::Duration;

use axum::{
    handler::Handler,
    http::Method,
    middleware::{from_fn, from_fn_with_state},
    routing::{on, MethodFilter, MethodRouter},
};

use crate::{
    conditional::{conditional_cache, is_cacheable_method},
    config::RateLimitConfig,
    error::{Error, Result},
    rate_limit::{RateLimit, RateLimiter},
};

/// Builds method routes wrapped in the rate limit and caching layers
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: RateLimitConfig,
    limiter: Option<RateLimiter>,
}

impl Pipeline {
    /// Create a pipeline; without a limiter every route is unlimited
    pub fn new(config: RateLimitConfig, limiter: Option<RateLimiter>) -> Self {
        if limiter.is_none() && config.enabled {
            tracing::warn!("No rate limit store available, requests will not be limited");
        }
        Self { config, limiter }
    }

    /// Same pipeline with a different limit per window
    #[must_use]
    pub fn with_limit(mut self, limit: u32, period: Duration) -> Self {
        self.config.limit = limit;
        self.config.period_secs = period.as_secs();
        self
    }

    /// Rate limit settings applied to new routes
    pub fn rate_limit_config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn rate_limit(&self, operation: &str) -> RateLimit {
        RateLimit::from_config(&self.config, self.limiter.clone(), operation)
    }

    /// Idempotent read route with conditional caching
    ///
    /// Fails with [`Error::NotIdempotent`] unless `method` is `GET` or `HEAD`.
    pub fn read<H, T, S>(&self, operation: &str, method: Method, handler: H) -> Result<MethodRouter<S>>
    where
        H: Handler<T, S>,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        if !is_cacheable_method(&method) {
            return Err(Error::NotIdempotent(method));
        }

        Ok(on(method_filter(&method)?, handler)
            .route_layer(from_fn(conditional_cache))
            .route_layer(from_fn_with_state(
                self.rate_limit(operation),
                RateLimit::middleware,
            )))
    }

    /// Write route, rate limited only
    pub fn write<H, T, S>(&self, operation: &str, method: Method, handler: H) -> Result<MethodRouter<S>>
    where
        H: Handler<T, S>,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        Ok(on(method_filter(&method)?, handler).route_layer(from_fn_with_state(
            self.rate_limit(operation),
            RateLimit::middleware,
        )))
    }
}

fn method_filter(method: &Method) -> Result<MethodFilter> {
    MethodFilter::try_from(method.clone())
        .map_err(|_| Error::Internal(format!("Unsupported route method: {}", method)))
}
