use chrono::{DateTime, SecondsFormat, Utc};
use classroll::prelude::*;
use serde_json::{json, Map, Value as JsonValue};
use url::Url;

use super::id_from_url;

pub const INVALID_STUDENT_URL: &str = "Invalid student URL";
pub const INVALID_CLASS_URL: &str = "Invalid class URL";

/// A student's enrollment in a class, keyed by both ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub student_id: i64,
    pub class_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Ids referenced by a registration body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationKey {
    pub student_id: i64,
    pub class_id: i64,
}

impl RegistrationKey {
    /// Resolve the `student_url` and `class_url` of a request body
    ///
    /// Existence of the referenced records is checked by the store.
    pub fn import(data: &JsonValue, root: &Url) -> Result<Self> {
        let student_id = data
            .get("student_url")
            .and_then(JsonValue::as_str)
            .and_then(|url| id_from_url(root, url, "students"))
            .ok_or_else(|| Error::Validation(INVALID_STUDENT_URL.to_string()))?;
        let class_id = data
            .get("class_url")
            .and_then(JsonValue::as_str)
            .and_then(|url| id_from_url(root, url, "classes"))
            .ok_or_else(|| Error::Validation(INVALID_CLASS_URL.to_string()))?;

        Ok(Self {
            student_id,
            class_id,
        })
    }
}

impl Registration {
    /// Queryable fields of registrations
    pub fn schema() -> Schema<Registration> {
        Schema::<Registration>::new("registrations")
            .field("student_id", FieldKind::Integer, |r| Value::Integer(r.student_id))
            .field("class_id", FieldKind::Integer, |r| Value::Integer(r.class_id))
            .field("timestamp", FieldKind::Timestamp, |r| Value::Timestamp(r.timestamp))
    }

    pub fn key(&self) -> RegistrationKey {
        RegistrationKey {
            student_id: self.student_id,
            class_id: self.class_id,
        }
    }
}

impl Record for Registration {
    fn locator(&self, base: &Url) -> String {
        resource_url(
            base,
            &[
                "v1",
                "registrations",
                &self.student_id.to_string(),
                &self.class_id.to_string(),
            ],
        )
    }

    fn export_representation(&self, base: &Url) -> Map<String, JsonValue> {
        let student_url = resource_url(base, &["v1", "students", &self.student_id.to_string()]);
        let class_url = resource_url(base, &["v1", "classes", &self.class_id.to_string()]);

        let mut map = Map::new();
        map.insert("self_url".to_string(), json!(self.locator(base)));
        map.insert("student_url".to_string(), json!(student_url));
        map.insert("class_url".to_string(), json!(class_url));
        map.insert(
            "timestamp".to_string(),
            json!(self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        map
    }
}
