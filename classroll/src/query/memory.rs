//! In-process queryable collection
//!
//! [`MemoryCollection`] evaluates compiled clauses through the schema
//! accessors. Clauses are only recorded by `filter`/`order_by`; the records are
//! scanned when `count` or `page` runs.
//!
//! The records may be owned (`Vec<R>`) or borrowed through any guard that
//! derefs to a slice, such as a mapped `RwLockReadGuard`. Only the rows of
//! the requested page are cloned.

use std::ops::Deref;
use std::sync::Arc;

use super::compiler::{FilterClause, SortClause};
use super::executor::Queryable;
use super::schema::Schema;
use crate::error::Result;

/// Records queried in memory
pub struct MemoryCollection<R, C = Vec<R>> {
    records: C,
    schema: Arc<Schema<R>>,
    filters: Vec<FilterClause>,
    sorts: Vec<SortClause>,
}

impl<R, C> MemoryCollection<R, C>
where
    C: Deref<Target = [R]>,
{
    /// Wrap a set of records
    pub fn new(records: C, schema: Arc<Schema<R>>) -> Self {
        Self {
            records,
            schema,
            filters: Vec::new(),
            sorts: Vec::new(),
        }
    }

    /// Schema the clauses are evaluated through
    pub fn schema(&self) -> &Schema<R> {
        &self.schema
    }

    fn matching(&self) -> impl Iterator<Item = &R> {
        self.records.iter().filter(move |record| {
            self.filters.iter().all(|clause| match self.schema.get(&clause.field) {
                Some(field) => clause.matches(&field.value_of(record)),
                // compiled against another schema; nothing can satisfy it
                None => false,
            })
        })
    }
}

impl<R, C> Queryable for MemoryCollection<R, C>
where
    R: Clone + Send + Sync,
    C: Deref<Target = [R]> + Send + Sync,
{
    type Item = R;

    fn filter(mut self, clause: &FilterClause) -> Self {
        self.filters.push(clause.clone());
        self
    }

    fn order_by(mut self, clause: &SortClause) -> Self {
        self.sorts.push(clause.clone());
        self
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.matching().count() as u64)
    }

    async fn page(&self, page: u32, per_page: u32) -> Result<Vec<R>> {
        let mut rows: Vec<&R> = self.matching().collect();

        let keys: Vec<_> = self
            .sorts
            .iter()
            .filter_map(|clause| {
                self.schema
                    .get(&clause.field)
                    .map(|field| (field, clause.direction))
            })
            .collect();

        if !keys.is_empty() {
            // stable, so records equal on every key keep insertion order
            rows.sort_by(|a, b| {
                keys.iter()
                    .map(|(field, direction)| {
                        direction.apply(field.value_of(a).sort_cmp(&field.value_of(b)))
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let per_page = per_page.max(1) as usize;
        let offset = (page.max(1) as usize - 1).saturating_mul(per_page);

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(per_page)
            .cloned()
            .collect())
    }
}
