//! Document store abstraction
//!
//! The resource framework talks to persistence through the [`DocumentStore`]
//! trait. Documents are JSON objects validated against an
//! [`EntitySchema`](crate::schema::EntitySchema) registered per collection.
//!
//! # Features
//!
//! - **Native query vocabulary**: [`Condition`], [`Filter`], [`SortKey`],
//!   [`Projection`] and [`Pagination`] composed into a [`DocumentQuery`]
//! - **Shape-preserving errors**: [`StoreError`] distinguishes cast,
//!   duplicate-key and validation failures
//! - **In-memory engine**: [`MemoryStore`] for single-process deployments and
//!   tests

mod document;
mod error;
mod memory;
mod query;
mod traits;

pub use document::DocumentId;
pub use error::{StoreError, StoreOperation};
pub use memory::MemoryStore;
pub use query::{
    Condition, DocumentQuery, Filter, Pagination, Projection, SortDirection, SortKey,
    StoreOperator,
};
pub use traits::{DocumentStore, StoreResult, UpdateSummary};
