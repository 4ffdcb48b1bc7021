//! Handler trait for REST CRUD patterns
//!
//! [`CollectionHandler`] exposes exactly the five CRUD operations of a
//! resource. It uses RPITIT (Return Position Impl Trait In Traits), so
//! implementations write plain `async fn` without `async_trait`. The generic
//! route handlers in [`routes`](super::routes) are written against this
//! trait; [`ResourceController`] is the stock implementation.

use std::future::Future;

use super::controller::{Listing, ResourceController};
use super::error::Failure;
use super::query::QuerySpec;
use crate::schema::Document;
use crate::store::{DocumentStore, Filter};

/// Standard REST CRUD handler trait
pub trait CollectionHandler: Send + Sync + 'static {
    /// Singular name, used as the `data` key of single-record responses
    fn entity_name(&self) -> &str;

    /// Plural name, used as the `data` key of list responses
    fn collection_name(&self) -> &str;

    /// List records matching `seed` and the query spec
    fn list(
        &self,
        seed: Filter,
        spec: QuerySpec,
    ) -> impl Future<Output = Result<Listing, Failure>> + Send;

    /// Fetch one record
    fn get(&self, id: &str) -> impl Future<Output = Result<Document, Failure>> + Send;

    /// Validate and store a new record
    fn create(&self, payload: Document) -> impl Future<Output = Result<Document, Failure>> + Send;

    /// Partially update a record, returning its new state
    fn update(
        &self,
        id: &str,
        payload: Document,
    ) -> impl Future<Output = Result<Document, Failure>> + Send;

    /// Remove a record
    fn delete(&self, id: &str) -> impl Future<Output = Result<(), Failure>> + Send;
}

impl<S: DocumentStore> CollectionHandler for ResourceController<S> {
    fn entity_name(&self) -> &str {
        self.entity()
    }

    fn collection_name(&self) -> &str {
        self.plural()
    }

    async fn list(&self, seed: Filter, spec: QuerySpec) -> Result<Listing, Failure> {
        self.list_all(seed, spec).await
    }

    async fn get(&self, id: &str) -> Result<Document, Failure> {
        self.get_one(id).await
    }

    async fn create(&self, payload: Document) -> Result<Document, Failure> {
        ResourceController::create(self, payload).await
    }

    async fn update(&self, id: &str, payload: Document) -> Result<Document, Failure> {
        ResourceController::update(self, id, payload).await
    }

    async fn delete(&self, id: &str) -> Result<(), Failure> {
        ResourceController::delete(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ApiError;
    use serde_json::json;
    use std::sync::Mutex;

    /// Handler recording calls, to check the trait is usable without a store
    #[derive(Default)]
    struct RecordingHandler {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingHandler {
        fn record(&self, call: impl Into<String>) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call.into());
            }
        }
    }

    impl CollectionHandler for RecordingHandler {
        fn entity_name(&self) -> &str {
            "note"
        }

        fn collection_name(&self) -> &str {
            "notes"
        }

        async fn list(&self, _seed: Filter, spec: QuerySpec) -> Result<Listing, Failure> {
            self.record(format!("list page={}", spec.page));
            Ok(Listing::default())
        }

        async fn get(&self, id: &str) -> Result<Document, Failure> {
            self.record(format!("get {id}"));
            Err(ApiError::entity_not_found("note").into())
        }

        async fn create(&self, payload: Document) -> Result<Document, Failure> {
            self.record("create");
            Ok(payload)
        }

        async fn update(&self, id: &str, payload: Document) -> Result<Document, Failure> {
            self.record(format!("update {id}"));
            Ok(payload)
        }

        async fn delete(&self, id: &str) -> Result<(), Failure> {
            self.record(format!("delete {id}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trait_dispatch() {
        let handler = RecordingHandler::default();
        let mut payload = Document::new();
        payload.insert("text".into(), json!("hello"));

        assert_eq!(handler.list(Filter::new(), QuerySpec::default()).await.unwrap().count, 0);
        assert!(handler.get("1").await.is_err());
        assert_eq!(handler.create(payload.clone()).await.unwrap(), payload);
        assert_eq!(handler.update("1", payload.clone()).await.unwrap(), payload);
        handler.delete("1").await.unwrap();

        let calls = handler.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["list page=1", "get 1", "create", "update 1", "delete 1"]
        );
    }
}
