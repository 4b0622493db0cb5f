//! PostgreSQL pool for pushed-down collection queries
//!
//! Services that keep their records in PostgreSQL build the pool from the
//! `[database]` config section and hand it to [`PgCollection`]:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use classroll::{database::create_pool, prelude::*};
//!
//! struct Student {
//!     id: i64,
//!     name: String,
//! }
//!
//! # async fn run() -> Result<()> {
//! let config = Config::load_for_service("classroll-api")?;
//! let Some(database) = config.database.as_ref() else {
//!     return Ok(());
//! };
//! let pool = create_pool(database).await?;
//!
//! let schema = Arc::new(
//!     Schema::new("students")
//!         .field("id", FieldKind::Integer, |s: &Student| Value::Integer(s.id))
//!         .field("name", FieldKind::Text, |s: &Student| Value::Text(s.name.clone())),
//! );
//! let students = PgCollection::new(pool, "students", schema);
//! # let _ = students;
//! # Ok(())
//! # }
//! ```
//!
//! [`PgCollection`]: crate::query::PgCollection

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use url::Url;

use crate::{config::DatabaseConfig, error::Result, retry::with_backoff};

/// Create a PostgreSQL pool, retrying with exponential backoff
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = with_backoff(
        "database",
        config.max_retries,
        Duration::from_secs(config.retry_delay_secs),
        || try_create_pool(config),
    )
    .await?;

    tracing::info!(
        "Database connection pool created at {}: max_connections={}",
        redact_url(&config.url),
        config.max_connections
    );
    Ok(pool)
}

async fn try_create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .connect(&config.url)
        .await?;
    Ok(pool)
}

/// Connection URL with the password masked, for logs
fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<unparsable url>".to_string(),
    }
}
