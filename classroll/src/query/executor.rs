//! Collection query execution
//!
//! [`run_collection_query`] pushes compiled clauses into a [`Queryable`]
//! source and asks it for the total count and one materialized page. It never
//! loads the whole collection itself; counting and slicing are the source's job.

use std::future::Future;

use super::compiler::{CompiledQuery, FilterClause, SortClause};
use crate::error::Result;
use crate::pagination::total_pages;

/// A lazily evaluated, composable data source
///
/// `filter` and `order_by` refine the query; `count` and `page` execute it.
/// Repeated `filter` calls are ANDed; repeated `order_by` calls add tie-break
/// keys after the ones already present.
pub trait Queryable: Sized + Send {
    /// Record type produced by the source
    type Item: Send;

    /// Restrict the source to records matching `clause`
    fn filter(self, clause: &FilterClause) -> Self;

    /// Add an ordering key
    fn order_by(self, clause: &SortClause) -> Self;

    /// Number of records matching every filter
    fn count(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Records on 1-indexed `page` of size `per_page`, in order
    fn page(&self, page: u32, per_page: u32) -> impl Future<Output = Result<Vec<Self::Item>>> + Send;
}

/// Validated page position of a collection request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Build a page request from raw query values
    ///
    /// `page` below 1 reads as 1. `per_page` defaults to `max_per_page` and is
    /// clamped into `1..=max_per_page`, never rejected.
    pub fn new(page: Option<u32>, per_page: Option<u32>, max_per_page: u32) -> Self {
        let max_per_page = max_per_page.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(max_per_page).clamp(1, max_per_page),
        }
    }

    /// 1-indexed page number
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Items per page
    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Number of records preceding this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

/// One materialized page plus collection totals
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    /// Records on this page
    pub items: Vec<T>,
    /// 1-indexed page number
    pub page: u32,
    /// Items per page
    pub per_page: u32,
    /// Records matching the filters, before pagination
    pub total: u64,
    /// Number of pages (0 for an empty collection)
    pub pages: u32,
}

impl<T> PageResult<T> {
    /// Whether a previous page exists
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Whether a next page exists
    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    /// Transform the records, keeping the totals
    pub fn map<U, F>(self, f: F) -> PageResult<U>
    where
        F: FnMut(T) -> U,
    {
        PageResult {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            pages: self.pages,
        }
    }
}

/// Apply filters then sorts to `source`, count it, and fetch the requested page
///
/// Errors from the source propagate unchanged.
pub async fn run_collection_query<Q: Queryable>(
    source: Q,
    query: &CompiledQuery,
    request: PageRequest,
) -> Result<PageResult<Q::Item>> {
    let source = query
        .filters
        .iter()
        .fold(source, |source, clause| source.filter(clause));
    let source = query
        .sorts
        .iter()
        .fold(source, |source, clause| source.order_by(clause));

    let total = source.count().await?;
    let items = source.page(request.page(), request.per_page()).await?;

    tracing::debug!(
        total,
        page = request.page(),
        per_page = request.per_page(),
        returned = items.len(),
        "Collection query executed"
    );

    Ok(PageResult {
        items,
        page: request.page(),
        per_page: request.per_page(),
        total,
        pages: total_pages(total, request.per_page()),
    })
}
