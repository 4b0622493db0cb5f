//! Collection response formatting
//!
//! Renders one page of records as
//!
//! ```json
//! {
//!   "students": ["http://localhost/v1/students/1", "..."],
//!   "meta": {
//!     "page": 1, "per_page": 10, "total": 12, "pages": 2,
//!     "prev_url": null,
//!     "next_url": "http://localhost/v1/students/?page=2&per_page=10",
//!     "first_url": "http://localhost/v1/students/?page=1&per_page=10",
//!     "last_url": "http://localhost/v1/students/?page=2&per_page=10"
//!   }
//! }
//! ```
//!
//! Items are locators by default, exported representations with `expand`.
//! [`paginate`] runs the whole read path: compile, query, plan links, format.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value as JsonValue};
use url::Url;

use crate::{
    error::Result,
    pagination::{CollectionParams, PageLinks},
    query::{compile_query, run_collection_query, PageRequest, PageResult, Queryable, Schema},
};

/// A record that can be rendered in collection responses
pub trait Record {
    /// Absolute URL of the record
    ///
    /// `base` is the external root of the service, ending in `/`.
    fn locator(&self, base: &Url) -> String;

    /// Full representation, including `self_url` and related collection URLs
    fn export_representation(&self, base: &Url) -> Map<String, JsonValue>;
}

/// Build an absolute URL below `base` from path segments
///
/// An empty last segment produces a trailing slash, as collection URLs have.
///
/// ```rust
/// use classroll::collection::resource_url;
/// use url::Url;
///
/// let base = Url::parse("http://localhost:5000/").unwrap();
/// assert_eq!(resource_url(&base, &["v1", "students", "3"]), "http://localhost:5000/v1/students/3");
/// assert_eq!(resource_url(&base, &["v1", "students", ""]), "http://localhost:5000/v1/students/");
/// ```
pub fn resource_url(base: &Url, segments: &[&str]) -> String {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url.to_string()
}

/// Per-endpoint collection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Response key of the item list; the schema's resource name when unset
    pub name: Option<String>,
    /// Upper bound (and default) of `per_page`
    pub max_per_page: u32,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            name: None,
            max_per_page: 10,
        }
    }
}

impl CollectionOptions {
    /// Options with the given page size bound
    pub fn new(max_per_page: u32) -> Self {
        Self {
            name: None,
            max_per_page,
        }
    }

    /// Override the response key
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Response key for a collection of `schema`'s resource
    pub fn resource_name<'a, R>(&'a self, schema: &'a Schema<R>) -> &'a str {
        self.name.as_deref().unwrap_or_else(|| schema.resource())
    }
}

/// `meta` object of a collection response
///
/// Missing links serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Meta {
    /// Page served, 1-indexed
    pub page: u32,
    /// Page size after capping
    pub per_page: u32,
    /// Records matching the filters, across all pages
    pub total: u64,
    /// Page count, 0 for an empty collection
    pub pages: u32,
    /// Previous page, absent on the first
    pub prev_url: Option<String>,
    /// Next page, absent on the last
    pub next_url: Option<String>,
    /// Page 1 with the same query
    pub first_url: String,
    /// Last page with the same query; page 1 when empty
    pub last_url: String,
}

/// A formatted collection page
///
/// Serializes as an object with the item list under [`name`](Self::name)
/// and the pagination block under `meta`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEnvelope {
    /// Key of the item list
    pub name: String,
    /// Locators or exported representations
    pub items: Vec<JsonValue>,
    /// Pagination block
    pub meta: Meta,
}

impl Serialize for CollectionEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(&self.name, &self.items)?;
        map.serialize_entry("meta", &self.meta)?;
        map.end()
    }
}

/// Render a page of records with its navigation links
pub fn format_collection<R: Record>(
    result: &PageResult<R>,
    links: PageLinks,
    expand: bool,
    name: &str,
    base: &Url,
) -> CollectionEnvelope {
    let items = result
        .items
        .iter()
        .map(|record| {
            if expand {
                JsonValue::Object(record.export_representation(base))
            } else {
                JsonValue::String(record.locator(base))
            }
        })
        .collect();

    CollectionEnvelope {
        name: name.to_string(),
        items,
        meta: Meta {
            page: result.page,
            per_page: result.per_page,
            total: result.total,
            pages: result.pages,
            prev_url: links.prev_url,
            next_url: links.next_url,
            first_url: links.first_url,
            last_url: links.last_url,
        },
    }
}

/// Serve one collection request end to end
///
/// `request_url` is the external URL of the collection endpoint (its query is
/// replaced in the links), `base` the external root records build locators
/// from.
pub async fn paginate<Q>(
    source: Q,
    schema: &Schema<Q::Item>,
    params: &CollectionParams,
    options: &CollectionOptions,
    request_url: &Url,
    base: &Url,
) -> Result<CollectionEnvelope>
where
    Q: Queryable,
    Q::Item: Record,
{
    let query = compile_query(schema, params.filter_spec(), params.sort_spec());
    let request = PageRequest::new(params.page, params.per_page, options.max_per_page);

    let result = run_collection_query(source, &query, request).await?;
    let links = PageLinks::plan(request_url, params, result.page, result.per_page, result.total);

    Ok(format_collection(
        &result,
        links,
        params.expand(),
        options.resource_name(schema),
        base,
    ))
}
