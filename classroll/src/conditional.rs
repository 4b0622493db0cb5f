//! Conditional request caching
//!
//! Fingerprints successful read responses and answers `If-Match` /
//! `If-None-Match` preconditions:
//!
//! - `If-Match` present and neither the ETag nor `*` listed: `412`
//! - otherwise `If-None-Match` listing the ETag or `*`: `304`, empty body
//! - otherwise the body is sent with `ETag` and `Cache-Control: max-age=86400`
//!
//! `If-Match` is evaluated first and, when present, `If-None-Match` is ignored.
//! Only `GET` and `HEAD` may be cached this way.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::{Error, Result};

/// `Cache-Control` value attached to fingerprinted responses
pub const CACHE_CONTROL: &str = "max-age=86400";

/// Quoted fingerprint of a response body
///
/// ```rust
/// use classroll::conditional::etag_for;
///
/// let etag = etag_for(b"{}");
/// assert!(etag.starts_with('"') && etag.ends_with('"'));
/// assert_eq!(etag, etag_for(b"{}"));
/// ```
pub fn etag_for(body: &[u8]) -> String {
    format!("\"{}\"", blake3::hash(body).to_hex())
}

/// Split a precondition header into trimmed entity tags
pub fn parse_etag_list(value: &str) -> Vec<&str> {
    value.split(',').map(str::trim).collect()
}

/// Whether conditional caching may be attached to `method`
pub fn is_cacheable_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Result of evaluating preconditions against a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalOutcome {
    /// Send the body with its validators
    Fresh {
        /// Quoted fingerprint
        etag: String,
    },
    /// The client's copy is current
    NotModified {
        /// Quoted fingerprint
        etag: String,
    },
    /// `If-Match` named another representation
    PreconditionFailed,
}

/// Fingerprint `body` and evaluate the request's preconditions
///
/// Fails with [`Error::NotIdempotent`] for methods other than `GET`/`HEAD`.
pub fn apply_conditional_cache(
    method: &Method,
    body: &[u8],
    request_headers: &HeaderMap,
) -> Result<ConditionalOutcome> {
    if !is_cacheable_method(method) {
        return Err(Error::NotIdempotent(method.clone()));
    }

    let etag = etag_for(body);

    if let Some(if_match) = precondition(request_headers, header::IF_MATCH) {
        let tags = parse_etag_list(if_match);
        if !tags.contains(&etag.as_str()) && !tags.contains(&"*") {
            return Ok(ConditionalOutcome::PreconditionFailed);
        }
    } else if let Some(if_none_match) = precondition(request_headers, header::IF_NONE_MATCH) {
        let tags = parse_etag_list(if_none_match);
        if tags.contains(&etag.as_str()) || tags.contains(&"*") {
            return Ok(ConditionalOutcome::NotModified { etag });
        }
    }

    Ok(ConditionalOutcome::Fresh { etag })
}

/// Non-empty header value; unreadable values count as absent
fn precondition(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
}

/// Middleware applying conditional caching to the wrapped handler's response
///
/// Non-2xx responses pass through untouched.
pub async fn conditional_cache(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    if !is_cacheable_method(&method) {
        return Error::NotIdempotent(method).into_response();
    }
    let request_headers = request.headers().clone();

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return Error::Internal(format!("Failed to buffer response body: {}", e)).into_response()
        }
    };

    match apply_conditional_cache(&method, &bytes, &request_headers) {
        Ok(ConditionalOutcome::Fresh { etag }) => {
            set_validators(&mut parts.headers, &etag);
            Response::from_parts(parts, Body::from(bytes))
        }
        Ok(ConditionalOutcome::NotModified { etag }) => {
            tracing::debug!(%etag, "Representation not modified");
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            set_validators(response.headers_mut(), &etag);
            response
        }
        Ok(ConditionalOutcome::PreconditionFailed) => Error::PreconditionFailed.into_response(),
        Err(e) => e.into_response(),
    }
}

fn set_validators(headers: &mut HeaderMap, etag: &str) {
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
}
