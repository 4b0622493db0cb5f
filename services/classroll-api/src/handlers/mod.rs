pub mod catalog;
pub mod classes;
pub mod registrations;
pub mod students;

use std::ops::Deref;
use std::sync::Arc;

use axum::body::Bytes;
use classroll::prelude::*;
use serde_json::Value as JsonValue;

use crate::store::{Owner, NOT_FOUND_MESSAGE};

/// Unknown route
pub async fn not_found() -> Error {
    Error::NotFound(NOT_FOUND_MESSAGE.to_string())
}

/// Known route, unsupported method
pub async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}

/// Parse a record id path segment; anything but an integer names no record
pub(crate) fn parse_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| Error::NotFound(NOT_FOUND_MESSAGE.to_string()))
}

/// Parse a request body as JSON regardless of its content type
pub(crate) fn json_body(body: &Bytes) -> Result<JsonValue> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejecting unparsable request body: {}", e);
        Error::BadRequest("invalid request".to_string())
    })
}

/// Render one page of `records` for the current request
///
/// `owner` narrows the records to one student's or class's registrations
/// before the request's own filters apply.
pub(crate) async fn collection<R, C>(
    records: C,
    owner: Option<Owner>,
    schema: &Arc<Schema<R>>,
    params: &CollectionParams,
    options: &CollectionOptions,
    url: &ExternalUrl,
) -> Result<ApiResponse>
where
    R: Record + Clone + Send + Sync,
    C: Deref<Target = [R]> + Send + Sync,
{
    let mut source = MemoryCollection::new(records, Arc::clone(schema));
    if let Some(owner) = owner {
        source = source.filter(&owner.clause());
    }
    let envelope = paginate(source, schema, params, options, url.request(), url.root()).await?;
    ApiResponse::ok(&envelope)
}
