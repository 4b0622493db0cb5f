use classroll::prelude::*;
use serde_json::{json, Map, Value as JsonValue};
use url::Url;

/// A class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub name: String,
}

impl Class {
    /// Queryable fields of classes
    pub fn schema() -> Schema<Class> {
        Schema::<Class>::new("classes")
            .field("id", FieldKind::Integer, |s| Value::Integer(s.id))
            .field("name", FieldKind::Text, |s| Value::Text(s.name.clone()))
    }

    /// URL of this class's registrations collection
    pub fn registrations_url(&self, base: &Url) -> String {
        resource_url(base, &["v1", "classes", &self.id.to_string(), "registrations", ""])
    }
}

impl Record for Class {
    fn locator(&self, base: &Url) -> String {
        resource_url(base, &["v1", "classes", &self.id.to_string()])
    }

    fn export_representation(&self, base: &Url) -> Map<String, JsonValue> {
        let mut map = Map::new();
        map.insert("self_url".to_string(), json!(self.locator(base)));
        map.insert("name".to_string(), json!(self.name));
        map.insert("registrations_url".to_string(), json!(self.registrations_url(base)));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export() {
        let base = Url::parse("http://localhost:5000/").unwrap();
        let class = Class {
            id: 2,
            name: "algebra".to_string(),
        };

        assert_eq!(
            JsonValue::Object(class.export_representation(&base)),
            json!({
                "self_url": "http://localhost:5000/v1/classes/2",
                "name": "algebra",
                "registrations_url": "http://localhost:5000/v1/classes/2/registrations/"
            })
        );
    }
}
