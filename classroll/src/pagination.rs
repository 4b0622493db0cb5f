//! Pagination planning for collection endpoints
//!
//! Computes page counts and the `first`/`prev`/`next`/`last` navigation links
//! of a collection response. Every link re-serializes the request URL with the
//! same `filter`, `sort` and `expand` parameters so that following links never
//! loses the client's query context.
//!
//! # Example
//!
//! ```rust
//! use classroll::pagination::{CollectionParams, PageLinks};
//! use url::Url;
//!
//! let base = Url::parse("http://localhost/v1/students/").unwrap();
//! let params = CollectionParams {
//!     sort: Some("name,desc".to_string()),
//!     ..Default::default()
//! };
//!
//! let links = PageLinks::plan(&base, &params, 1, 2, 5);
//! assert!(links.prev_url.is_none());
//! assert!(links.next_url.unwrap().contains("page=2"));
//! assert!(links.last_url.contains("page=3"));
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Deserializer, Serialize};
use url::{form_urlencoded, Url};

/// Query parameters understood by collection endpoints
///
/// Extract it directly in a handler. The first occurrence of a repeated
/// parameter wins and the extractor never rejects a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionParams {
    /// Filter spec, e.g. `name,like,s%;id,gt,3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Sort spec, e.g. `name,desc;id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    /// Page number (1-indexed); unparsable values read as absent
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub page: Option<u32>,

    /// Items per page; unparsable values read as absent
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub per_page: Option<u32>,

    /// Any non-empty value selects expanded representations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,
}

impl CollectionParams {
    /// Read the parameters from a raw query string
    ///
    /// Unknown keys are ignored; unparsable `page`/`per_page` read as absent.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        let mut page = None;
        let mut per_page = None;

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match &*key {
                "filter" => {
                    params.filter.get_or_insert_with(|| value.into_owned());
                }
                "sort" => {
                    params.sort.get_or_insert_with(|| value.into_owned());
                }
                "expand" => {
                    params.expand.get_or_insert_with(|| value.into_owned());
                }
                "page" => {
                    page.get_or_insert_with(|| parse_count(&value));
                }
                "per_page" => {
                    per_page.get_or_insert_with(|| parse_count(&value));
                }
                _ => {}
            }
        }

        params.page = page.flatten();
        params.per_page = per_page.flatten();
        params
    }

    /// Whether expanded representations were requested
    pub fn expand(&self) -> bool {
        self.expand.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Non-empty filter spec
    pub fn filter_spec(&self) -> Option<&str> {
        self.filter.as_deref().filter(|f| !f.is_empty())
    }

    /// Non-empty sort spec
    pub fn sort_spec(&self) -> Option<&str> {
        self.sort.as_deref().filter(|s| !s.is_empty())
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_count))
}

fn parse_count(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

impl<S> FromRequestParts<S> for CollectionParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_query(parts.uri.query().unwrap_or_default()))
    }
}

/// Calculate total pages, rounding up; zero items means zero pages
pub fn total_pages(total: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page.max(1));
    let pages = total.div_ceil(per_page);
    pages.min(u64::from(u32::MAX)) as u32
}

/// Navigation links of one collection page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    /// Previous page, absent on page 1
    pub prev_url: Option<String>,
    /// Next page, absent on the last page
    pub next_url: Option<String>,
    /// First page
    pub first_url: String,
    /// Last page (page 1 when the collection is empty)
    pub last_url: String,
}

impl PageLinks {
    /// Plan the links for `page` of a collection holding `total` items
    ///
    /// `base` is the external URL of the collection endpoint; any query string
    /// it carries is replaced.
    pub fn plan(base: &Url, params: &CollectionParams, page: u32, per_page: u32, total: u64) -> Self {
        let pages = total_pages(total, per_page);

        let prev_url = (page > 1).then(|| page_url(base, params, page - 1, per_page));
        let next_url = (page < pages).then(|| page_url(base, params, page + 1, per_page));

        Self {
            prev_url,
            next_url,
            first_url: page_url(base, params, 1, per_page),
            last_url: page_url(base, params, pages.max(1), per_page),
        }
    }
}

/// Re-serialize the collection URL for another page
///
/// Parameter order is stable: `filter`, `sort`, `page`, `per_page`, `expand`.
pub fn page_url(base: &Url, params: &CollectionParams, page: u32, per_page: u32) -> String {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);

    {
        let mut query = url.query_pairs_mut();
        if let Some(filter) = params.filter_spec() {
            query.append_pair("filter", filter);
        }
        if let Some(sort) = params.sort_spec() {
            query.append_pair("sort", sort);
        }
        query.append_pair("page", &page.to_string());
        query.append_pair("per_page", &per_page.to_string());
        if params.expand() {
            if let Some(expand) = params.expand.as_deref() {
                query.append_pair("expand", expand);
            }
        }
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:5000/v1/students/").unwrap()
    }

    fn query_of(link: &str) -> CollectionParams {
        let url = Url::parse(link).unwrap();
        let mut params = CollectionParams::default();
        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            match &*key {
                "filter" => params.filter = Some(value),
                "sort" => params.sort = Some(value),
                "page" => params.page = value.parse().ok(),
                "per_page" => params.per_page = value.parse().ok(),
                "expand" => params.expand = Some(value),
                other => panic!("unexpected parameter {other}"),
            }
        }
        params
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(5, 2), 3);
        assert_eq!(total_pages(5, 0), 5);
    }

    #[test]
    fn test_first_page_links() {
        let links = PageLinks::plan(&base(), &CollectionParams::default(), 1, 2, 5);
        assert!(links.prev_url.is_none());
        assert_eq!(
            links.next_url.as_deref(),
            Some("http://localhost:5000/v1/students/?page=2&per_page=2")
        );
        assert_eq!(links.first_url, "http://localhost:5000/v1/students/?page=1&per_page=2");
        assert_eq!(links.last_url, "http://localhost:5000/v1/students/?page=3&per_page=2");
    }

    #[test]
    fn test_last_page_links() {
        let links = PageLinks::plan(&base(), &CollectionParams::default(), 3, 2, 5);
        assert!(links.next_url.is_none());
        assert_eq!(query_of(links.prev_url.as_deref().unwrap()).page, Some(2));
    }

    #[test]
    fn test_empty_collection_links() {
        let links = PageLinks::plan(&base(), &CollectionParams::default(), 1, 10, 0);
        assert!(links.prev_url.is_none());
        assert!(links.next_url.is_none());
        assert_eq!(links.first_url, links.last_url);
        assert_eq!(query_of(&links.last_url).page, Some(1));
    }

    #[test]
    fn test_links_carry_every_parameter() {
        let params = CollectionParams {
            filter: Some("name,like,s%;id,in,1,2".to_string()),
            sort: Some("name,desc;id".to_string()),
            page: Some(2),
            per_page: Some(1),
            expand: Some("1".to_string()),
        };
        let links = PageLinks::plan(&base(), &params, 2, 1, 3);

        for link in [
            links.prev_url.as_deref().unwrap(),
            links.next_url.as_deref().unwrap(),
            links.first_url.as_str(),
            links.last_url.as_str(),
        ] {
            let carried = query_of(link);
            assert_eq!(carried.filter, params.filter);
            assert_eq!(carried.sort, params.sort);
            assert_eq!(carried.expand, params.expand);
            assert_eq!(carried.per_page, Some(1));
        }
    }

    #[test]
    fn test_base_query_string_is_replaced() {
        let base = Url::parse("http://localhost/v1/classes/?page=7&junk=1#frag").unwrap();
        let url = page_url(&base, &CollectionParams::default(), 1, 10);
        assert_eq!(url, "http://localhost/v1/classes/?page=1&per_page=10");
    }

    #[test]
    fn test_lenient_page_numbers() {
        let params: CollectionParams =
            serde_json::from_str(r#"{"page": "abc", "per_page": "5", "sort": "id"}"#).unwrap();
        assert_eq!(params.page, None);
        assert_eq!(params.per_page, Some(5));
        assert_eq!(params.sort_spec(), Some("id"));
    }

    #[test]
    fn test_from_query_keeps_first_occurrence() {
        let params = CollectionParams::from_query(
            "page=2&page=5&filter=id%2Ceq%2C1&filter=id%2Ceq%2C2&per_page=x&per_page=3&junk=1",
        );
        assert_eq!(params.page, Some(2));
        assert_eq!(params.filter_spec(), Some("id,eq,1"));
        // an unparsable first value still wins
        assert_eq!(params.per_page, None);
        assert_eq!(params.sort, None);
    }

    #[test]
    fn test_from_query_decodes_values() {
        let params = CollectionParams::from_query("sort=name,desc;id&filter=name,like,s%25&expand=1");
        assert_eq!(params.sort_spec(), Some("name,desc;id"));
        assert_eq!(params.filter_spec(), Some("name,like,s%"));
        assert!(params.expand());
        assert_eq!(CollectionParams::from_query(""), CollectionParams::default());
    }

    #[test]
    fn test_expand_flag() {
        let mut params = CollectionParams::default();
        assert!(!params.expand());
        params.expand = Some(String::new());
        assert!(!params.expand());
        params.expand = Some("true".to_string());
        assert!(params.expand());
    }
}
