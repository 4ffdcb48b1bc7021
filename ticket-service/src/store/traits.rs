//! Document store trait
//!
//! The store is the only stateful collaborator of the resource framework. It
//! is expressed with RPITIT (Return Position Impl Trait In Traits) so
//! implementations can use plain `async fn` without `async_trait`.

use std::future::Future;

use super::document::DocumentId;
use super::error::StoreError;
use super::query::{DocumentQuery, Filter};
use crate::schema::Document;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of a bulk update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateSummary {
    /// Documents matching the filter
    pub matched: u64,
    /// Documents whose stored value actually changed
    pub modified: u64,
}

/// Document-oriented persistence engine
///
/// Every write is validated against the collection's schema by the store
/// itself. Each call is atomic with respect to other calls; there is no
/// multi-document transaction and the last write to a document wins.
pub trait DocumentStore: Send + Sync + 'static {
    /// Run a composed read
    ///
    /// Filter operands are cast to the field types; a failing cast is
    /// reported as [`StoreError::Cast`].
    fn find(
        &self,
        query: &DocumentQuery,
    ) -> impl Future<Output = StoreResult<Vec<Document>>> + Send;

    /// Fetch one document, expanding the given relation paths
    fn find_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
        populate: &[String],
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Validate and insert a new document, returning it as stored
    fn insert(
        &self,
        collection: &str,
        payload: Document,
    ) -> impl Future<Output = StoreResult<Document>> + Send;

    /// Apply a partial update, returning the post-update document
    ///
    /// Returns `Ok(None)` when no document has the identifier.
    fn update_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Document,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Apply the same partial update to every document matching `filter`
    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
    ) -> impl Future<Output = StoreResult<UpdateSummary>> + Send;

    /// Remove a document, returning it if it existed
    fn delete_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;
}
