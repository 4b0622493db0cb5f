//! # classroll
//!
//! Generic REST resource layer for axum services.
//!
//! ## Features
//!
//! - **Collection queries**: `filter`, `sort`, `page`, `per_page` and `expand`
//!   query parameters over any [`Queryable`](query::Queryable) source
//! - **Pagination links**: `first`/`prev`/`next`/`last` URLs that keep the
//!   client's filter, sort and expand parameters
//! - **Conditional caching**: `ETag` fingerprints with `If-Match` (412) and
//!   `If-None-Match` (304) handling for read routes
//! - **Rate limiting**: fixed-window per-operation, per-caller counters in
//!   Redis or process memory, with `X-RateLimit-*` headers
//! - **Configuration**: figment layering of defaults, TOML files and
//!   `CLASSROLL_` environment variables
//!
//! ## Example
//!
//! ```rust,no_run
//! use classroll::prelude::*;
//!
//! async fn index() -> ApiResponse {
//!     ApiResponse::empty()
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load_for_service("school")?;
//!     init_tracing(&config)?;
//!
//!     let pipeline = Pipeline::new(config.rate_limit.clone(), Some(RateLimiter::in_memory()));
//!     let app = Router::new().route("/", pipeline.read("index", Method::GET, index)?);
//!
//!     Server::new(config).serve(app).await
//! }
//! ```

#[cfg(feature = "cache")]
pub mod cache;
pub mod collection;
pub mod conditional;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod error;
pub mod external_url;
pub mod observability;
pub mod pagination;
pub mod query;
pub mod rate_limit;
pub mod responses;
pub mod routes;
pub mod server;

mod retry;

/// Commonly used types
pub mod prelude {
    pub use crate::collection::{
        format_collection, paginate, resource_url, CollectionEnvelope, CollectionOptions, Meta,
        Record,
    };
    pub use crate::conditional::{apply_conditional_cache, etag_for, ConditionalOutcome};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorResponse, Result};
    pub use crate::external_url::{ExternalUrl, PublicUrl};
    pub use crate::observability::init_tracing;
    pub use crate::pagination::{CollectionParams, PageLinks};
    pub use crate::query::{
        compile_query, run_collection_query, CompiledQuery, FieldKind, MemoryCollection,
        PageRequest, PageResult, Queryable, Schema, Value,
    };
    #[cfg(feature = "database")]
    pub use crate::query::PgCollection;
    #[cfg(feature = "cache")]
    pub use crate::rate_limit::RedisCounterStore;
    pub use crate::rate_limit::{
        Caller, CounterStore, MemoryCounterStore, RateLimit, RateLimitDecision, RateLimiter,
    };
    pub use crate::responses::ApiResponse;
    pub use crate::routes::Pipeline;
    pub use crate::server::Server;

    pub use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, Method, StatusCode},
        response::{IntoResponse, Json, Response},
        Extension, Router,
    };

    pub use serde::{Deserialize, Serialize};

    pub use tracing::{debug, error, info, warn};
}
