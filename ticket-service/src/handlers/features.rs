//! Query feature pipeline
//!
//! Turns a [`QuerySpec`] into a [`DocumentQuery`] against one collection.
//! The stages run in a fixed order (filter, sort, limit fields, paginate,
//! populate), each consuming and returning the pipeline:
//!
//! ```rust
//! use ticket_service::handlers::{QueryFeatures, QueryParams, QuerySpec};
//! use ticket_service::store::Filter;
//!
//! let spec = QuerySpec::parse(&QueryParams::parse("status[ne]=CLOSED&secret=1").unwrap());
//! let query = QueryFeatures::new("tickets", &["id", "status", "createdAt"], Filter::new(), &spec)
//!     .filter()
//!     .sort()
//!     .limit_fields()
//!     .paginate()
//!     .populate()
//!     .into_query();
//!
//! assert_eq!(query.filter_ref().conditions().len(), 1);
//! ```
//!
//! Only allow-listed fields reach the store: filter clauses, sort keys and
//! projected fields naming anything else are dropped.

use serde_json::Value;

use super::query::{FieldSelection, QuerySpec};
use crate::schema::VERSION_FIELD;
use crate::store::{Condition, DocumentQuery, Filter, Pagination, Projection, SortKey};

/// Field sorted on, descending, when the request names no usable sort key
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Builder applying the query stages to a [`DocumentQuery`]
#[derive(Debug, Clone)]
pub struct QueryFeatures<'a> {
    spec: &'a QuerySpec,
    allow_list: &'a [&'a str],
    seed: Filter,
    query: DocumentQuery,
}

impl<'a> QueryFeatures<'a> {
    /// Start a pipeline over `collection`
    ///
    /// `seed` is a base filter supplied by the caller (for instance a date
    /// range); client clauses are appended to it.
    pub fn new(
        collection: &str,
        allow_list: &'a [&'a str],
        seed: Filter,
        spec: &'a QuerySpec,
    ) -> Self {
        Self {
            spec,
            allow_list,
            seed,
            query: DocumentQuery::new(collection),
        }
    }

    fn allowed(&self, field: &str) -> bool {
        self.allow_list.contains(&field)
    }

    /// Append allow-listed comparison clauses, translated to store operators
    #[must_use]
    pub fn filter(mut self) -> Self {
        let clauses = self
            .spec
            .filters
            .iter()
            .filter(|clause| self.allowed(&clause.field))
            .map(|clause| {
                Condition::new(
                    clause.field.clone(),
                    clause.op.native(),
                    Value::String(clause.value.clone()),
                )
            })
            .collect::<Vec<_>>();

        let filter = std::mem::take(&mut self.seed).merge(Filter::from(clauses));
        self.query = self.query.filter(filter);
        self
    }

    /// Apply requested sort keys, or descending creation time
    #[must_use]
    pub fn sort(mut self) -> Self {
        let keys: Vec<SortKey> = self
            .spec
            .sort_keys
            .iter()
            .filter(|key| self.allowed(&key.field))
            .cloned()
            .collect();
        let keys = if keys.is_empty() {
            vec![SortKey::descending(DEFAULT_SORT_FIELD)]
        } else {
            keys
        };
        self.query = self.query.sort(keys);
        self
    }

    /// Apply the requested projection, or hide the version field
    #[must_use]
    pub fn limit_fields(mut self) -> Self {
        let projection = match &self.spec.projection {
            Some(FieldSelection::Include(fields)) => self.allowed_fields(fields).map(Projection::Include),
            Some(FieldSelection::Exclude(fields)) => self.allowed_fields(fields).map(|mut fields| {
                fields.push(VERSION_FIELD.to_string());
                Projection::Exclude(fields)
            }),
            None => None,
        };
        self.query = self.query.project(projection.unwrap_or_default());
        self
    }

    fn allowed_fields(&self, fields: &[String]) -> Option<Vec<String>> {
        let kept: Vec<String> = fields
            .iter()
            .filter(|field| self.allowed(field))
            .cloned()
            .collect();
        (!kept.is_empty()).then_some(kept)
    }

    /// Skip `(page - 1) * limit` documents and return at most `limit`
    #[must_use]
    pub fn paginate(mut self) -> Self {
        self.query = self
            .query
            .paginate(Pagination::page(self.spec.page, self.spec.page_size));
        self
    }

    /// Expand the relations named by the spec, if any
    #[must_use]
    pub fn populate(mut self) -> Self {
        if !self.spec.populate.is_empty() {
            self.query = self.query.populate(self.spec.populate.clone());
        }
        self
    }

    pub fn into_query(self) -> DocumentQuery {
        self.query
    }
}
