//! External URLs of the current request
//!
//! Locators and pagination links must be absolute URLs as the client sees
//! them. [`ExternalUrl`] reconstructs them from the configured public URL
//! ([`PublicUrl`] request extension) or, without one, from the `Host` and
//! `X-Forwarded-Proto` headers.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{header, request::Parts, HeaderMap},
};
use url::Url;

use crate::error::{Error, Result};

/// Configured external root of the service, installed as a request extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUrl(pub Url);

impl PublicUrl {
    /// Parse a public URL, forcing a trailing slash on its path
    pub fn parse(raw: &str) -> Result<Self> {
        let mut url =
            Url::parse(raw).map_err(|e| Error::BadRequest(format!("Invalid public URL '{raw}': {e}")))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self(url))
    }
}

/// Absolute URLs of the current request and of the service root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalUrl {
    request: Url,
    root: Url,
}

impl ExternalUrl {
    /// Reconstruct the external URLs from request parts
    pub fn from_parts(parts: &Parts) -> Result<Self> {
        let root = match parts.extensions.get::<PublicUrl>() {
            Some(PublicUrl(url)) => url.clone(),
            None => root_from_headers(&parts.headers)?,
        };

        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| &original.0)
            .unwrap_or(&parts.uri);
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .trim_start_matches('/');

        let request = root
            .join(path_and_query)
            .map_err(|e| Error::BadRequest(format!("Invalid request URL: {e}")))?;

        Ok(Self { request, root })
    }

    /// The request URL, query string included
    pub fn request(&self) -> &Url {
        &self.request
    }

    /// The service root, ending in `/`
    pub fn root(&self) -> &Url {
        &self.root
    }
}

impl<S> FromRequestParts<S> for ExternalUrl
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        Self::from_parts(parts)
    }
}

fn root_from_headers(headers: &HeaderMap) -> Result<Url> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost");

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|proto| matches!(*proto, "http" | "https"))
        .unwrap_or("http");

    Url::parse(&format!("{scheme}://{host}/"))
        .map_err(|e| Error::BadRequest(format!("Invalid Host header '{host}': {e}")))
}
