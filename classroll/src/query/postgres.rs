//! PostgreSQL queryable collection
//!
//! [`PgCollection`] translates compiled clauses into a parameterized SQL
//! statement with [`sqlx::QueryBuilder`]. Filtering, ordering, counting and
//! slicing all run in the database; only the requested page is fetched.
//!
//! Column names come from the [`Schema`], never from the request, and every
//! operand is a bound parameter.

use std::sync::Arc;

use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};

use super::compiler::{FilterClause, FilterOp, Operand, SortClause, SortDirection};
use super::executor::Queryable;
use super::schema::{Schema, Value};
use crate::error::Result;

/// A table queried through PostgreSQL
pub struct PgCollection<R> {
    pool: PgPool,
    table: String,
    schema: Arc<Schema<R>>,
    filters: Vec<FilterClause>,
    sorts: Vec<SortClause>,
}

impl<R> PgCollection<R> {
    /// Query `table` (optionally schema-qualified, e.g. `school.students`)
    pub fn new(pool: PgPool, table: impl Into<String>, schema: Arc<Schema<R>>) -> Self {
        Self {
            pool,
            table: table.into(),
            schema,
            filters: Vec::new(),
            sorts: Vec::new(),
        }
    }

    fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM ");
        builder.push(quote_table(&self.table));
        self.push_where(&mut builder);
        builder
    }

    fn page_query(&self, page: u32, per_page: u32) -> QueryBuilder<'static, Postgres> {
        let per_page = per_page.max(1);
        let offset = i64::from(page.max(1) - 1) * i64::from(per_page);

        let mut builder = QueryBuilder::new("SELECT * FROM ");
        builder.push(quote_table(&self.table));
        self.push_where(&mut builder);
        self.push_order_by(&mut builder);
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(per_page));
        builder.push(" OFFSET ");
        builder.push_bind(offset);
        builder
    }

    fn push_where(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        let mut first = true;

        for clause in &self.filters {
            let Some(field) = self.schema.get(&clause.field) else {
                continue;
            };

            builder.push(if first { " WHERE " } else { " AND " });
            first = false;

            let column = quote_ident(field.column());
            match (&clause.op, &clause.operand) {
                (FilterOp::In, Operand::Set(values)) if values.is_empty() => {
                    builder.push("FALSE");
                }
                (FilterOp::In, Operand::Set(values)) => {
                    builder.push(&column).push(" IN (");
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            builder.push(", ");
                        }
                        push_value(builder, value);
                    }
                    builder.push(")");
                }
                (op, Operand::Single(value)) => {
                    builder.push(&column).push(comparison_sql(*op));
                    push_value(builder, value);
                }
                // an `in` set is the only multi-valued operand
                (_, Operand::Set(_)) => {
                    builder.push("FALSE");
                }
            }
        }
    }

    fn push_order_by(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        let mut first = true;

        for clause in &self.sorts {
            let Some(field) = self.schema.get(&clause.field) else {
                continue;
            };

            builder.push(if first { " ORDER BY " } else { ", " });
            first = false;

            // nulls order lowest, same as the in-memory collection
            let nulls = match clause.direction {
                SortDirection::Asc => " NULLS FIRST",
                SortDirection::Desc => " NULLS LAST",
            };
            builder
                .push(quote_ident(field.column()))
                .push(" ")
                .push(clause.direction.as_sql())
                .push(nulls);
        }
    }
}

impl<R> Queryable for PgCollection<R>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin,
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
        let mut query = self.count_query();
        let total = query.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn page(&self, page: u32, per_page: u32) -> Result<Vec<R>> {
        let mut query = self.page_query(page, per_page);
        let rows = query.build_query_as::<R>().fetch_all(&self.pool).await?;
        Ok(rows)
    }
}

fn comparison_sql(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => " = ",
        FilterOp::Ne => " <> ",
        FilterOp::Lt => " < ",
        FilterOp::Le => " <= ",
        FilterOp::Gt => " > ",
        FilterOp::Ge => " >= ",
        // backslash is the default escape, as in like_match
        FilterOp::Like => " ILIKE ",
        FilterOp::In => " = ",
    }
}

fn push_value(builder: &mut QueryBuilder<'static, Postgres>, value: &Value) {
    match value.clone() {
        Value::Null => builder.push("NULL"),
        Value::Boolean(b) => builder.push_bind(b),
        Value::Integer(n) => builder.push_bind(n),
        Value::Float(n) => builder.push_bind(n),
        Value::Text(s) => builder.push_bind(s),
        Value::Timestamp(ts) => builder.push_bind(ts),
    };
}

/// Quote a SQL identifier, doubling embedded quotes
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_table(table: &str) -> String {
    table.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}
