//! Query-string parsing for list operations
//!
//! [`QueryParams`] holds the raw key/value pairs of a request's query string;
//! [`QuerySpec`] is their typed reading: comparison clauses, sort keys,
//! projection, pagination and the relations to populate.
//!
//! Parsing is purely syntactic. Which fields may actually be filtered, sorted
//! or projected is decided by the [`QueryFeatures`](super::QueryFeatures)
//! pipeline against the entity's allow-list.
//!
//! # Example
//!
//! ```rust
//! use ticket_service::handlers::{ComparisonOp, QueryParams, QuerySpec};
//!
//! let params = QueryParams::parse("price[gte]=10&sort=-price,title&page=2&limit=5").unwrap();
//! let spec = QuerySpec::parse(&params);
//!
//! assert_eq!(spec.filters[0].field, "price");
//! assert_eq!(spec.filters[0].op, ComparisonOp::Gte);
//! assert_eq!(spec.sort_keys.len(), 2);
//! assert_eq!((spec.page, spec.page_size), (2, 5));
//! ```

use std::fmt;

use axum::extract::Query;
use axum::http::Uri;

use super::error::ApiError;
use crate::store::{SortDirection, SortKey, StoreOperator};

/// Query keys that drive the pipeline rather than filter documents
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Page used when `page` is missing or invalid
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when `limit` is missing or invalid
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Raw query-string pairs in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Decode a raw (still percent-encoded) query string
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        if raw.is_empty() {
            return Ok(Self::default());
        }
        let uri: Uri = format!("/?{raw}")
            .parse()
            .map_err(|_| ApiError::bad_request("Malformed query string"))?;
        Query::<Vec<(String, String)>>::try_from_uri(&uri)
            .map(|Query(pairs)| Self(pairs))
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// Remove every occurrence of `key`, returning the first value
    pub fn take(&mut self, key: &str) -> Option<String> {
        let first = self.get(key).map(str::to_string);
        self.0.retain(|(candidate, _)| candidate != key);
        first
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Comparison requested by a bracketed key suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    /// Read a suffix such as `gte` from `price[gte]`
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }

    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }

    /// The store's native operator for this comparison
    pub const fn native(self) -> StoreOperator {
        match self {
            Self::Eq => StoreOperator::Eq,
            Self::Ne => StoreOperator::Ne,
            Self::Gt => StoreOperator::Gt,
            Self::Gte => StoreOperator::Gte,
            Self::Lt => StoreOperator::Lt,
            Self::Lte => StoreOperator::Lte,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// `field <op> value` as requested by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonClause {
    pub field: String,
    pub op: ComparisonOp,
    pub value: String,
}

impl ComparisonClause {
    /// Parse a query key into field and operator
    ///
    /// `status` is an equality; `price[gte]` a comparison. Unknown suffixes,
    /// nested brackets and empty field names yield `None`.
    pub fn parse_key(key: &str) -> Option<(&str, ComparisonOp)> {
        let (field, op) = match key.split_once('[') {
            None => (key, ComparisonOp::Eq),
            Some((field, rest)) => {
                let suffix = rest.strip_suffix(']')?;
                if suffix.contains(['[', ']']) {
                    return None;
                }
                (field, ComparisonOp::from_suffix(suffix)?)
            }
        };
        if field.is_empty() || field.contains(']') {
            return None;
        }
        Some((field, op))
    }

    fn key(&self) -> String {
        match self.op {
            ComparisonOp::Eq => self.field.clone(),
            op => format!("{}[{}]", self.field, op),
        }
    }
}

/// Requested field projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl FieldSelection {
    /// Read a `fields` value; a leading `-` excludes a field
    ///
    /// Inclusion and exclusion cannot be mixed: when any field is included,
    /// the excluded ones are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for entry in raw.split(',').map(str::trim) {
            match entry.strip_prefix('-') {
                Some("") => {}
                Some(field) => exclude.push(field.to_string()),
                None if entry.is_empty() => {}
                None => include.push(entry.to_string()),
            }
        }
        if !include.is_empty() {
            Some(Self::Include(include))
        } else if !exclude.is_empty() {
            Some(Self::Exclude(exclude))
        } else {
            None
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Include(fields) => fields.join(","),
            Self::Exclude(fields) => fields
                .iter()
                .map(|field| format!("-{field}"))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Typed reading of a list request's query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// Comparison clauses in arrival order
    pub filters: Vec<ComparisonClause>,
    /// Sort keys in priority order; empty means the default order
    pub sort_keys: Vec<SortKey>,
    /// Requested projection; `None` means the default projection
    pub projection: Option<FieldSelection>,
    /// 1-based page number
    pub page: u64,
    /// Page size
    pub page_size: u64,
    /// Relations to expand
    pub populate: Vec<String>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort_keys: Vec::new(),
            projection: None,
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            populate: Vec::new(),
        }
    }
}

impl QuerySpec {
    /// Read a query mapping
    ///
    /// Reserved keys use their first occurrence. Malformed pagination values
    /// fall back to the defaults and malformed filter keys are dropped; this
    /// never fails.
    pub fn parse(params: &QueryParams) -> Self {
        let filters = params
            .pairs()
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .filter_map(|(key, value)| {
                ComparisonClause::parse_key(key).map(|(field, op)| ComparisonClause {
                    field: field.to_string(),
                    op,
                    value: value.clone(),
                })
            })
            .collect();

        Self {
            filters,
            sort_keys: params.get("sort").map(parse_sort).unwrap_or_default(),
            projection: params.get("fields").and_then(FieldSelection::parse),
            page: positive_or(params.get("page"), DEFAULT_PAGE),
            page_size: positive_or(params.get("limit"), DEFAULT_PAGE_SIZE),
            populate: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_populate(mut self, populate: Vec<String>) -> Self {
        self.populate = populate;
        self
    }

    /// Render back into a query mapping that parses to the same spec
    pub fn to_params(&self) -> QueryParams {
        let mut pairs: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|clause| (clause.key(), clause.value.clone()))
            .collect();

        if !self.sort_keys.is_empty() {
            let sort = self
                .sort_keys
                .iter()
                .map(|key| match key.direction {
                    SortDirection::Ascending => key.field.clone(),
                    SortDirection::Descending => format!("-{}", key.field),
                })
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("sort".to_string(), sort));
        }
        if let Some(selection) = &self.projection {
            pairs.push(("fields".to_string(), selection.render()));
        }
        pairs.push(("page".to_string(), self.page.to_string()));
        pairs.push(("limit".to_string(), self.page_size.to_string()));
        QueryParams(pairs)
    }
}

fn parse_sort(raw: &str) -> Vec<SortKey> {
    raw.split(',')
        .map(str::trim)
        .filter_map(|entry| match entry.strip_prefix('-') {
            Some("") => None,
            Some(field) => Some(SortKey::descending(field)),
            None if entry.is_empty() => None,
            None => Some(SortKey::ascending(entry)),
        })
        .collect()
}

fn positive_or(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value >= 1)
        .unwrap_or(default)
}
