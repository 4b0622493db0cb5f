//! JSON response envelope for resource handlers
//!
//! Handlers return an [`ApiResponse`]: a JSON body plus an optional status
//! override and extra headers. The envelope keeps the status and headers
//! explicit instead of inferring them from tuple shapes.
//!
//! ```rust
//! use classroll::responses::ApiResponse;
//! use axum::http::StatusCode;
//!
//! // 201 with a Location header and an empty `{}` body
//! let created = ApiResponse::created("http://localhost/v1/students/3");
//! assert_eq!(created.status(), StatusCode::CREATED);
//! ```

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};

/// A JSON body with its status and extra headers
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    body: JsonValue,
    status: StatusCode,
    headers: HeaderMap,
}

impl ApiResponse {
    /// `200 OK` with `body`
    pub fn json(body: JsonValue) -> Self {
        Self {
            body,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    /// `200 OK` with any serializable body
    pub fn ok<T: Serialize>(body: &T) -> Result<Self> {
        let body = serde_json::to_value(body)
            .map_err(|e| Error::Internal(format!("Failed to serialize response: {}", e)))?;
        Ok(Self::json(body))
    }

    /// `200 OK` with an empty `{}` body
    pub fn empty() -> Self {
        Self::json(JsonValue::Object(Map::new()))
    }

    /// `201 Created` with an empty `{}` body and a `Location` header
    pub fn created(location: &str) -> Self {
        Self::empty()
            .with_status(StatusCode::CREATED)
            .with_header(header::LOCATION, location)
    }

    /// Override the status code
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header; values that are not valid header text are skipped
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!("Skipping invalid {} header value", name),
        }
        self
    }

    /// Status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// JSON body
    pub fn body(&self) -> &JsonValue {
        &self.body
    }

    /// Extra headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl From<Map<String, JsonValue>> for ApiResponse {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self::json(JsonValue::Object(map))
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn body_of(response: Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_created_has_location_and_empty_body() {
        let response = ApiResponse::created("http://localhost/v1/classes/4").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers()[header::LOCATION],
            "http://localhost/v1/classes/4"
        );
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(body_of(response).await, json!({}));
    }

    #[tokio::test]
    async fn test_ok_serializes_body() {
        #[derive(Serialize)]
        struct Catalog {
            students_url: String,
        }

        let response = ApiResponse::ok(&Catalog {
            students_url: "http://localhost/v1/students/".to_string(),
        })
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_of(response.into_response()).await,
            json!({"students_url": "http://localhost/v1/students/"})
        );
    }

    #[test]
    fn test_invalid_header_value_skipped() {
        let response = ApiResponse::empty().with_header(header::LOCATION, "bad\nvalue");
        assert!(response.headers().is_empty());
    }
}
