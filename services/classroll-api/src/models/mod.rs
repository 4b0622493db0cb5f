//! Resource models and their import/export rules

pub mod class;
pub mod registration;
pub mod student;

pub use class::Class;
pub use registration::Registration;
pub use student::Student;

use classroll::error::{Error, Result};
use serde_json::Value as JsonValue;
use url::Url;

/// Read the required `name` of a student or class body
///
/// `kind` names the resource in the validation message.
pub(crate) fn import_name(data: &JsonValue, kind: &str) -> Result<String> {
    data.get("name")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Validation(format!("Invalid {}: missing name", kind)))
}

/// Resolve a resource URL such as `http://host/v1/students/3` to its id
///
/// Relative URLs resolve against `root`. URLs on another host, or that do
/// not point at a single record of `collection`, resolve to `None`.
pub(crate) fn id_from_url(root: &Url, raw: &str, collection: &str) -> Option<i64> {
    let url = root.join(raw).ok()?;
    if url.host_str() != root.host_str() || url.port() != root.port() {
        return None;
    }

    let path = url.path().strip_prefix(root.path())?;
    let mut segments = path.split('/');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some("v1"), Some(name), Some(id), None) if name == collection => id.parse().ok(),
        _ => None,
    }
}
