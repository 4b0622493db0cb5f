use classroll::prelude::*;
use serde_json::{json, Map, Value as JsonValue};
use url::Url;

/// A student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
}

impl Student {
    /// Queryable fields of students
    pub fn schema() -> Schema<Student> {
        Schema::<Student>::new("students")
            .field("id", FieldKind::Integer, |s| Value::Integer(s.id))
            .field("name", FieldKind::Text, |s| Value::Text(s.name.clone()))
    }

    /// URL of this student's registrations collection
    pub fn registrations_url(&self, base: &Url) -> String {
        resource_url(base, &["v1", "students", &self.id.to_string(), "registrations", ""])
    }
}

impl Record for Student {
    fn locator(&self, base: &Url) -> String {
        resource_url(base, &["v1", "students", &self.id.to_string()])
    }

    fn export_representation(&self, base: &Url) -> Map<String, JsonValue> {
        let mut map = Map::new();
        map.insert("self_url".to_string(), json!(self.locator(base)));
        map.insert("name".to_string(), json!(self.name));
        map.insert("registrations_url".to_string(), json!(self.registrations_url(base)));
        map
    }
}
