//! Error types and HTTP response conversion

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Redis error (counter store)
    #[cfg(feature = "cache")]
    #[error("Redis error: {0}")]
    Redis(Box<redis::RedisError>),

    /// Database error raised by a pushed-down collection query
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(Box<sqlx::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body failed validation against the resource
    #[error("Validation error: {0}")]
    Validation(String),

    /// Route exists but not for this method
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// `If-Match` did not name the current representation
    #[error("Precondition failed")]
    PreconditionFailed,

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Conditional caching was wired onto a method with side effects
    #[error("Conditional caching is only supported for GET and HEAD, not {0}")]
    NotIdempotent(Method),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(feature = "cache")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Redis(Box::new(err))
    }
}

#[cfg(feature = "cache")]
impl From<deadpool_redis::PoolError> for Error {
    fn from(err: deadpool_redis::PoolError) -> Self {
        let redis_err = redis::RedisError::from((
            redis::ErrorKind::IoError,
            "Failed to get Redis connection",
            err.to_string(),
        ));
        Error::Redis(Box::new(redis_err))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(Box::new(err))
    }
}

/// JSON error body
///
/// `{"status": 412, "error": "precondition failed"}`, with an optional
/// human readable `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status: u16,

    /// Short lowercase reason
    pub error: String,

    /// Optional detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Create an error body without a message
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            error: error.into(),
            message: None,
        }
    }

    /// Create an error body with a message
    pub fn with_message(
        status: StatusCode,
        error: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: status.as_u16(),
            error: error.into(),
            message: Some(message.into()),
        }
    }

    /// Status code carried by the body
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Message attached to 429 responses
pub const RATE_LIMIT_MESSAGE: &str = "You have exceeded your request rate";

impl Error {
    /// Map the error onto the JSON body returned to clients
    ///
    /// Internal details are logged, never sent.
    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            Error::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                internal_error()
            }

            #[cfg(feature = "cache")]
            Error::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                internal_error()
            }

            #[cfg(feature = "database")]
            Error::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal_error()
            }

            Error::Io(e) => {
                tracing::error!("I/O error: {}", e);
                internal_error()
            }

            Error::NotFound(msg) => {
                ErrorResponse::with_message(StatusCode::NOT_FOUND, "not found", msg.clone())
            }

            Error::BadRequest(msg) | Error::Validation(msg) => {
                ErrorResponse::with_message(StatusCode::BAD_REQUEST, "bad request", msg.clone())
            }

            Error::MethodNotAllowed => {
                ErrorResponse::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
            }

            Error::PreconditionFailed => {
                ErrorResponse::new(StatusCode::PRECONDITION_FAILED, "precondition failed")
            }

            Error::RateLimitExceeded => ErrorResponse::with_message(
                StatusCode::TOO_MANY_REQUESTS,
                "too many requests",
                RATE_LIMIT_MESSAGE,
            ),

            Error::NotIdempotent(method) => {
                tracing::error!("Conditional caching wired onto {} route", method);
                internal_error()
            }

            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal_error()
            }
        }
    }
}

fn internal_error() -> ErrorResponse {
    ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.to_error_response().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_failed_body() {
        let body = Error::PreconditionFailed.to_error_response();
        assert_eq!(body.status, 412);
        assert_eq!(body.error, "precondition failed");
        assert!(body.message.is_none());

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"status": 412, "error": "precondition failed"}));
    }

    #[test]
    fn test_rate_limit_body() {
        let body = Error::RateLimitExceeded.to_error_response();
        assert_eq!(body.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.message.as_deref(), Some(RATE_LIMIT_MESSAGE));
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let body = Error::Validation("Invalid class URL".to_string()).to_error_response();
        assert_eq!(body.status, 400);
        assert_eq!(body.error, "bad request");
        assert_eq!(body.message.as_deref(), Some("Invalid class URL"));
    }

    #[test]
    fn test_internal_details_hidden() {
        let body = Error::Internal("pool poisoned".to_string()).to_error_response();
        assert_eq!(body.status, 500);
        assert!(body.message.is_none());
    }

    #[test]
    fn test_into_response_status() {
        let response = Error::NotFound("item not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
