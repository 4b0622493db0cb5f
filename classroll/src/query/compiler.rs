//! Filter and sort specification compiler
//!
//! Turns the textual `filter` and `sort` query parameters into typed clauses
//! bound to a [`Schema`].
//!
//! - `filter`: clauses separated by `;`, each `field,op,operand` (or
//!   `field,in,a,b,c`).
//! - `sort`: clauses separated by `;`, each `field` or `field,asc|desc`.
//!
//! Malformed input never fails: a clause naming an unknown field or
//! operator, with the wrong number of components, or with an operand that
//! does not fit the field's kind is dropped and the rest of the query still
//! applies.
//!
//! # Example
//!
//! ```rust
//! use classroll::query::{compile_query, FieldKind, Schema, SortDirection, Value};
//!
//! struct Student { id: i64, name: String }
//!
//! let schema = Schema::<Student>::new("students")
//!     .field("id", FieldKind::Integer, |s| Value::Integer(s.id))
//!     .field("name", FieldKind::Text, |s| Value::Text(s.name.clone()));
//!
//! let query = compile_query(&schema, Some("id,gt,3;shoe_size,eq,9"), Some("name,desc"));
//! assert_eq!(query.filters.len(), 1);
//! assert_eq!(query.sorts[0].direction, SortDirection::Desc);
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::schema::{FieldKind, Schema, Value};

/// Comparison operator of a filter clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    /// `eq`
    Eq,
    /// `ne`
    Ne,
    /// `lt`
    Lt,
    /// `le`
    Le,
    /// `gt`
    Gt,
    /// `ge`
    Ge,
    /// `in`: membership in an operand set
    In,
    /// `like`: SQL LIKE pattern (`%` and `_` wildcards)
    Like,
}

impl FilterOp {
    /// Parse an operator token; unknown tokens yield `None`
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            "in" => Some(Self::In),
            "like" => Some(Self::Like),
            _ => None,
        }
    }

    /// Token as it appears in a filter spec
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::In => "in",
            Self::Like => "like",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a filter clause
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Operand of every operator except `in`
    Single(Value),
    /// Operand set of `in`
    Set(Vec<Value>),
}

/// One compiled filter instruction
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    /// Schema field name
    pub field: String,
    /// Comparison operator
    pub op: FilterOp,
    /// Typed operand(s)
    pub operand: Operand,
}

impl FilterClause {
    /// Whether a record's field value satisfies this clause
    ///
    /// Comparisons against `Null` or a value of another kind are false.
    pub fn matches(&self, value: &Value) -> bool {
        match (&self.op, &self.operand) {
            (FilterOp::In, Operand::Set(set)) => set
                .iter()
                .any(|candidate| value.compare(candidate) == Some(Ordering::Equal)),
            (FilterOp::Like, Operand::Single(Value::Text(pattern))) => match value {
                Value::Text(text) => like_match(pattern, text),
                _ => false,
            },
            (op, Operand::Single(operand)) => match value.compare(operand) {
                Some(ordering) => match op {
                    FilterOp::Eq => ordering == Ordering::Equal,
                    FilterOp::Ne => ordering != Ordering::Equal,
                    FilterOp::Lt => ordering == Ordering::Less,
                    FilterOp::Le => ordering != Ordering::Greater,
                    FilterOp::Gt => ordering == Ordering::Greater,
                    FilterOp::Ge => ordering != Ordering::Less,
                    FilterOp::In | FilterOp::Like => false,
                },
                None => false,
            },
            _ => false,
        }
    }
}

/// Sort direction of a sort clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending (the default)
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl SortDirection {
    /// SQL ORDER BY keyword
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Apply this direction to an ascending comparison result
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// One compiled sort instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortClause {
    /// Schema field name
    pub field: String,
    /// Direction
    pub direction: SortDirection,
}

/// Ordered filter and sort clauses for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    /// Filters, ANDed in order
    pub filters: Vec<FilterClause>,
    /// Sorts, first clause is the primary key
    pub sorts: Vec<SortClause>,
}

impl CompiledQuery {
    /// Whether neither filters nor sorts survived compilation
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.sorts.is_empty()
    }
}

/// Compile the `filter` and `sort` parameters of a collection request
pub fn compile_query<R>(
    schema: &Schema<R>,
    filter_spec: Option<&str>,
    sort_spec: Option<&str>,
) -> CompiledQuery {
    CompiledQuery {
        filters: filter_spec
            .map(|spec| compile_filters(schema, spec))
            .unwrap_or_default(),
        sorts: sort_spec
            .map(|spec| compile_sorts(schema, spec))
            .unwrap_or_default(),
    }
}

/// Compile a filter spec, dropping every clause that does not fit the schema
pub fn compile_filters<R>(schema: &Schema<R>, spec: &str) -> Vec<FilterClause> {
    spec.split(';')
        .filter_map(|raw| {
            let clause = compile_filter_clause(schema, raw);
            if clause.is_none() && !raw.is_empty() {
                tracing::debug!(clause = raw, resource = schema.resource(), "Ignoring filter clause");
            }
            clause
        })
        .collect()
}

fn compile_filter_clause<R>(schema: &Schema<R>, raw: &str) -> Option<FilterClause> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() < 3 {
        return None;
    }

    let op = FilterOp::parse(parts[1])?;
    if parts.len() > 3 && op != FilterOp::In {
        return None;
    }

    let field = schema.get(parts[0])?;
    let kind = field.kind();

    let operand = match op {
        FilterOp::In => Operand::Set(
            parts[2..]
                .iter()
                .map(|raw| kind.parse_operand(raw))
                .collect::<Option<Vec<_>>>()?,
        ),
        FilterOp::Like if kind != FieldKind::Text || !is_valid_like_pattern(parts[2]) => {
            return None
        }
        _ => Operand::Single(kind.parse_operand(parts[2])?),
    };

    Some(FilterClause {
        field: parts[0].to_string(),
        op,
        operand,
    })
}

/// Compile a sort spec; unknown fields are dropped, bad directions sort ascending
pub fn compile_sorts<R>(schema: &Schema<R>, spec: &str) -> Vec<SortClause> {
    spec.split(';')
        .filter_map(|raw| {
            let parts: Vec<&str> = raw.split(',').collect();
            if schema.get(parts[0]).is_none() {
                if !raw.is_empty() {
                    tracing::debug!(clause = raw, resource = schema.resource(), "Ignoring sort clause");
                }
                return None;
            }

            let direction = match parts.as_slice() {
                [_, "desc"] => SortDirection::Desc,
                _ => SortDirection::Asc,
            };

            Some(SortClause {
                field: parts[0].to_string(),
                direction,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    AnyRun,
    AnyOne,
    Literal(char),
}

/// Tokenize a LIKE pattern; `None` when it ends in a lone `\`
fn like_tokens(pattern: &str) -> Option<Vec<LikeToken>> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            '\\' => LikeToken::Literal(chars.next()?.to_ascii_lowercase()),
            c => LikeToken::Literal(c.to_ascii_lowercase()),
        });
    }
    Some(tokens)
}

/// Whether `pattern` is a well-formed LIKE pattern
///
/// A trailing unescaped `\` is rejected, as PostgreSQL rejects it.
pub fn is_valid_like_pattern(pattern: &str) -> bool {
    like_tokens(pattern).is_some()
}

/// SQL LIKE matching, ASCII case-insensitive
///
/// `%` matches any run of characters (including none), `_` exactly one, and
/// `\` makes the next character literal, as PostgreSQL's default escape does.
/// Malformed patterns match nothing.
pub fn like_match(pattern: &str, text: &str) -> bool {
    let Some(pattern) = like_tokens(pattern) else {
        return false;
    };
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `%` seen and the text index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        let single = match pattern.get(p) {
            Some(LikeToken::AnyOne) => true,
            Some(LikeToken::Literal(c)) => *c == text[t],
            _ => false,
        };

        if single {
            p += 1;
            t += 1;
        } else if pattern.get(p) == Some(&LikeToken::AnyRun) {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&token| token == LikeToken::AnyRun)
}
