//! Filter, ordering, projection and pagination types for store reads
//!
//! These are the store's native query vocabulary. The HTTP-facing
//! [`QuerySpec`](crate::handlers::QuerySpec) is translated into a
//! [`DocumentQuery`] by the query feature pipeline before execution.
//!
//! # Example
//!
//! ```rust
//! use ticket_service::store::{Condition, DocumentQuery, Filter, SortKey};
//!
//! let query = DocumentQuery::new("tickets")
//!     .filter(Filter::new().and(Condition::ne("status", "CLOSED")))
//!     .sort(vec![SortKey::descending("createdAt")]);
//!
//! assert_eq!(query.filter_ref().conditions().len(), 1);
//! ```

use std::fmt;

use serde_json::{json, Map, Value};

use crate::schema::VERSION_FIELD;

/// Native comparison operators understood by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl StoreOperator {
    /// Operator token as rendered in a query document
    pub const fn token(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }
}

impl fmt::Display for StoreOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A single `field <op> value` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: StoreOperator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: StoreOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, StoreOperator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, StoreOperator::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, StoreOperator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, StoreOperator::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, StoreOperator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, StoreOperator::Lte, value)
    }
}

/// Conjunction of conditions; empty matches every document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Append every condition of `other`
    #[must_use]
    pub fn merge(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Render as a query document: `{ field: { "$op": value } }`
    ///
    /// Conditions on the same field share one operator object. A repeated
    /// operator on the same field keeps the last value in the rendering,
    /// while evaluation still applies every condition.
    pub fn render(&self) -> Value {
        let mut rendered = Map::new();
        for condition in &self.conditions {
            let entry = rendered
                .entry(condition.field.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(operators) = entry {
                operators.insert(condition.operator.token().to_string(), condition.value.clone());
            }
        }
        Value::Object(rendered)
    }
}

impl From<Vec<Condition>> for Filter {
    fn from(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// `1` for ascending, `-1` for descending
    pub const fn signum(self) -> i64 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Field selection applied to returned documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Every stored field
    All,
    /// Only these fields (plus the identifier)
    Include(Vec<String>),
    /// Every field except these
    Exclude(Vec<String>),
}

impl Default for Projection {
    fn default() -> Self {
        Self::Exclude(vec![VERSION_FIELD.to_string()])
    }
}

impl Projection {
    fn render(&self) -> Value {
        match self {
            Self::All => json!({}),
            Self::Include(fields) => Value::Object(
                fields
                    .iter()
                    .map(|field| (field.clone(), Value::from(1)))
                    .collect(),
            ),
            Self::Exclude(fields) => Value::Object(
                fields
                    .iter()
                    .map(|field| (field.clone(), Value::from(0)))
                    .collect(),
            ),
        }
    }
}

/// Window of results to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of results to skip
    pub skip: u64,
    /// Maximum number of results to return
    pub limit: u64,
}

impl Pagination {
    pub const fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit }
    }

    /// Window for a 1-based page number
    pub const fn page(page: u64, page_size: u64) -> Self {
        Self {
            skip: page.saturating_sub(1).saturating_mul(page_size),
            limit: page_size,
        }
    }
}

/// A composed read against one collection
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    collection: String,
    filter: Filter,
    sort: Vec<SortKey>,
    projection: Projection,
    pagination: Option<Pagination>,
    populate: Vec<String>,
}

impl DocumentQuery {
    /// Unconstrained query over `collection`
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::new(),
            sort: Vec::new(),
            projection: Projection::All,
            pagination: None,
            populate: Vec::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.sort = keys;
        self
    }

    #[must_use]
    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    #[must_use]
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    #[must_use]
    pub fn populate(mut self, paths: Vec<String>) -> Self {
        self.populate = paths;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn filter_ref(&self) -> &Filter {
        &self.filter
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn pagination(&self) -> Option<Pagination> {
        self.pagination
    }

    pub fn populate_paths(&self) -> &[String] {
        &self.populate
    }

    /// Deterministic rendering of the whole query
    pub fn render(&self) -> Value {
        let sort: Vec<Value> = self
            .sort
            .iter()
            .map(|key| json!([key.field, key.direction.signum()]))
            .collect();

        json!({
            "collection": self.collection,
            "filter": self.filter.render(),
            "sort": sort,
            "projection": self.projection.render(),
            "skip": self.pagination.map(|p| p.skip),
            "limit": self.pagination.map(|p| p.limit),
            "populate": self.populate,
        })
    }
}
