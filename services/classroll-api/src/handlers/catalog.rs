use classroll::prelude::*;
use serde_json::json;

/// Service root: collection URLs per API version
pub async fn index(url: ExternalUrl) -> ApiResponse {
    ApiResponse::json(json!({ "versions": { "v1": v1_catalog(url.root()) } }))
}

pub fn v1_catalog(root: &url::Url) -> serde_json::Value {
    json!({
        "students_url": resource_url(root, &["v1", "students", ""]),
        "classes_url": resource_url(root, &["v1", "classes", ""]),
        "registrations_url": resource_url(root, &["v1", "registrations", ""]),
    })
}
