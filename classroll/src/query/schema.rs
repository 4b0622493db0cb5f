//! Field registry for queryable resources
//!
//! A [`Schema`] maps the field names a client may use in `filter` and `sort`
//! to a typed accessor. It is built once per resource type at startup and
//! consulted by name at request time; a name that is not registered is simply
//! not addressable.
//!
//! # Example
//!
//! ```rust
//! use classroll::query::{FieldKind, Schema, Value};
//!
//! struct Student { id: i64, name: String }
//!
//! let schema = Schema::<Student>::new("students")
//!     .field("id", FieldKind::Integer, |s| Value::Integer(s.id))
//!     .field("name", FieldKind::Text, |s| Value::Text(s.name.clone()));
//!
//! assert!(schema.get("name").is_some());
//! assert!(schema.get("password_hash").is_none());
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Comparable value type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
    /// UTF-8 text
    Text,
    /// Boolean (`true`/`false`/`1`/`0`)
    Boolean,
    /// UTC timestamp (RFC 3339, or `YYYY-MM-DDTHH:MM:SS` read as UTC)
    Timestamp,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Text => write!(f, "text"),
            Self::Boolean => write!(f, "boolean"),
            Self::Timestamp => write!(f, "timestamp"),
        }
    }
}

impl FieldKind {
    /// Convert a raw operand from a query string into a value of this kind
    ///
    /// Returns `None` when the text does not describe a value of this kind.
    pub fn parse_operand(&self, raw: &str) -> Option<Value> {
        match self {
            Self::Integer => raw.trim().parse().ok().map(Value::Integer),
            Self::Float => raw.trim().parse().ok().map(Value::Float),
            Self::Text => Some(Value::Text(raw.to_string())),
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Boolean(true)),
                "false" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },
            Self::Timestamp => {
                let raw = raw.trim();
                DateTime::parse_from_rfc3339(raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
                    .or_else(|| {
                        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                            .ok()
                            .map(|naive| naive.and_utc())
                    })
                    .map(Value::Timestamp)
            }
        }
    }
}

/// A field value read from a record or parsed from a query string
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Timestamp value
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Compare two values of compatible kinds
    ///
    /// Integers and floats compare numerically with each other. Any other
    /// mix of kinds, and anything involving `Null`, is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls first, incomparable values tie
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Whether this is [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Reads a field value out of a record
pub type Accessor<R> = fn(&R) -> Value;

/// One addressable field of a resource
pub struct Field<R> {
    kind: FieldKind,
    column: String,
    accessor: Accessor<R>,
}

impl<R> Field<R> {
    /// Value type of the field
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Storage column the field maps to
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Read the field from a record
    pub fn value_of(&self, record: &R) -> Value {
        (self.accessor)(record)
    }
}

impl<R> Clone for Field<R> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            column: self.column.clone(),
            accessor: self.accessor,
        }
    }
}

impl<R> fmt::Debug for Field<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("kind", &self.kind)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Static field registry of a resource type
pub struct Schema<R> {
    resource: String,
    fields: HashMap<String, Field<R>>,
}

impl<R> Schema<R> {
    /// Create an empty schema for the named resource
    ///
    /// The resource name doubles as the default collection key in responses.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            fields: HashMap::new(),
        }
    }

    /// Register a field whose storage column has the same name
    #[must_use]
    pub fn field(self, name: impl Into<String>, kind: FieldKind, accessor: Accessor<R>) -> Self {
        let name = name.into();
        let column = name.clone();
        self.column(name, kind, column, accessor)
    }

    /// Register a field stored under a different column name
    #[must_use]
    pub fn column(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        column: impl Into<String>,
        accessor: Accessor<R>,
    ) -> Self {
        self.fields.insert(
            name.into(),
            Field {
                kind,
                column: column.into(),
                accessor,
            },
        );
        self
    }

    /// Resource name
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&Field<R>> {
        self.fields.get(name)
    }

    /// Number of registered fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are registered
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<R> Clone for Schema<R> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl<R> fmt::Debug for Schema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("resource", &self.resource)
            .field("fields", &self.fields)
            .finish()
    }
}
