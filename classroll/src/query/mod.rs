//! Collection query processing
//!
//! The pieces a collection endpoint chains together:
//!
//! 1. [`Schema`]: which fields of a resource are addressable, and their types
//! 2. [`compile_query`]: `filter`/`sort` query parameters to typed clauses
//! 3. [`run_collection_query`]: clauses pushed into a [`Queryable`] source,
//!    then counted and paged
//!
//! Malformed or unknown clauses are dropped, never reported to the client.

pub mod compiler;
pub mod executor;
pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;
pub mod schema;

pub use compiler::{
    compile_filters, compile_query, compile_sorts, is_valid_like_pattern, like_match,
    CompiledQuery, FilterClause, FilterOp, Operand, SortClause, SortDirection,
};
pub use executor::{run_collection_query, PageRequest, PageResult, Queryable};
pub use memory::MemoryCollection;
#[cfg(feature = "database")]
pub use postgres::PgCollection;
pub use schema::{Accessor, Field, FieldKind, Schema, Value};
