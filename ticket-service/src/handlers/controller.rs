//! Generic resource controller
//!
//! [`ResourceController`] implements the five CRUD operations for any entity
//! type, parameterised by an [`EntitySchema`], a singular entity name and a
//! [`PopulateDirective`]. Workflow controllers compose it and add their own
//! operations on top.

use std::sync::Arc;

use super::error::{ApiError, ApiOperation, Failure};
use super::features::QueryFeatures;
use super::query::QuerySpec;
use crate::schema::{Document, EntitySchema, ID_FIELD};
use crate::store::{DocumentId, DocumentStore, Filter, UpdateSummary};

/// Relations to expand, per kind of read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateDirective {
    /// Expanded on list reads
    pub list: Vec<String>,
    /// Expanded on single-record reads
    pub single: Vec<String>,
}

/// Result of a list read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub items: Vec<Document>,
    pub count: usize,
}

impl From<Vec<Document>> for Listing {
    fn from(items: Vec<Document>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

/// CRUD operations over one collection of a [`DocumentStore`]
pub struct ResourceController<S> {
    store: Arc<S>,
    schema: Arc<EntitySchema>,
    entity: String,
    plural: String,
    populate: PopulateDirective,
}

impl<S> Clone for ResourceController<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            schema: Arc::clone(&self.schema),
            entity: self.entity.clone(),
            plural: self.plural.clone(),
            populate: self.populate.clone(),
        }
    }
}

impl<S: DocumentStore> ResourceController<S> {
    /// Controller for `entity`; the plural defaults to `entity` + `s`
    pub fn new(store: Arc<S>, schema: Arc<EntitySchema>, entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self {
            store,
            schema,
            plural: format!("{entity}s"),
            entity,
            populate: PopulateDirective::default(),
        }
    }

    #[must_use]
    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = plural.into();
        self
    }

    #[must_use]
    pub fn with_populate(mut self, populate: PopulateDirective) -> Self {
        self.populate = populate;
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn collection(&self) -> &str {
        self.schema.collection()
    }

    /// Read an identifier; malformed identifiers read as absent records
    pub fn parse_id(&self, raw: &str) -> Result<DocumentId, ApiError> {
        DocumentId::parse(raw).map_err(|_| self.not_found())
    }

    fn not_found(&self) -> ApiError {
        ApiError::entity_not_found(&self.entity)
    }

    /// List documents matching `seed` and the spec's allow-listed clauses
    ///
    /// Nothing matching is an empty listing, never an error.
    pub async fn list_all(&self, seed: Filter, spec: QuerySpec) -> Result<Listing, Failure> {
        let spec = if spec.populate.is_empty() {
            spec.with_populate(self.populate.list.clone())
        } else {
            spec
        };
        let allow_list = self.schema.allow_list();
        let query = QueryFeatures::new(self.collection(), &allow_list, seed, &spec)
            .filter()
            .sort()
            .limit_fields()
            .paginate()
            .populate()
            .into_query();

        tracing::debug!(
            operation = %ApiOperation::List,
            entity = %self.entity,
            query = %query.render(),
            "querying store"
        );
        let items = self.store.find(&query).await?;
        Ok(Listing::from(items))
    }

    pub async fn get_one(&self, id: &str) -> Result<Document, Failure> {
        let id = self.parse_id(id)?;
        self.store
            .find_by_id(self.collection(), &id, &self.populate.single)
            .await?
            .ok_or_else(|| self.not_found().into())
    }

    pub async fn create(&self, payload: Document) -> Result<Document, Failure> {
        let document = self.store.insert(self.collection(), payload).await?;
        tracing::info!(
            operation = %ApiOperation::Create,
            entity = %self.entity,
            id = ?document.get(ID_FIELD),
            "document created"
        );
        Ok(document)
    }

    /// Partial update; validators re-run on the fields being set
    pub async fn update(&self, id: &str, payload: Document) -> Result<Document, Failure> {
        let id = self.parse_id(id)?;
        self.store
            .update_by_id(self.collection(), &id, payload)
            .await?
            .ok_or_else(|| self.not_found().into())
    }

    pub async fn delete(&self, id: &str) -> Result<(), Failure> {
        let id = self.parse_id(id)?;
        match self.store.delete_by_id(self.collection(), &id).await? {
            Some(_) => {
                tracing::info!(
                    operation = %ApiOperation::Delete,
                    entity = %self.entity,
                    %id,
                    "document deleted"
                );
                Ok(())
            }
            None => Err(self.not_found().into()),
        }
    }

    /// Apply one patch to every document matching `filter`
    pub async fn update_many(
        &self,
        filter: &Filter,
        patch: Document,
    ) -> Result<UpdateSummary, Failure> {
        Ok(self
            .store
            .update_many(self.collection(), filter, patch)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::query::QueryParams;
    use crate::handlers::ApiErrorKind;
    use crate::schema::FieldSpec;
    use crate::store::{Condition, MemoryStore, StoreError};
    use serde_json::{json, Value};

    fn schemas() -> (Arc<EntitySchema>, Arc<EntitySchema>) {
        let owners = Arc::new(
            EntitySchema::new("owners").field(FieldSpec::text("name").required("Name is required")),
        );
        let pets = Arc::new(
            EntitySchema::new("pets")
                .field(FieldSpec::text("name").required("Name is required").unique())
                .field(FieldSpec::number("age"))
                .field(FieldSpec::reference("owner", "owners"))
                .field(FieldSpec::timestamp("createdAt").default_now()),
        );
        (owners, pets)
    }

    fn controllers() -> (ResourceController<MemoryStore>, ResourceController<MemoryStore>) {
        let (owners, pets) = schemas();
        let store = Arc::new(
            MemoryStore::new()
                .with_schema(Arc::clone(&owners))
                .with_schema(Arc::clone(&pets)),
        );
        (
            ResourceController::new(Arc::clone(&store), owners, "owner"),
            ResourceController::new(store, pets, "pet").with_populate(PopulateDirective {
                list: Vec::new(),
                single: vec!["owner".to_string()],
            }),
        )
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    fn id(document: &Document) -> String {
        document[ID_FIELD].as_str().unwrap().to_string()
    }

    fn operational_kind(failure: &Failure) -> Option<ApiErrorKind> {
        match failure {
            Failure::Operational(error) => Some(error.kind()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_plural_defaults() {
        let (owners, pets) = controllers();
        assert_eq!(owners.plural(), "owners");
        assert_eq!(pets.with_plural("animals").plural(), "animals");
    }

    #[tokio::test]
    async fn test_list_all_empty_is_success() {
        let (_, pets) = controllers();
        let listing = pets.list_all(Filter::new(), QuerySpec::default()).await.unwrap();
        assert_eq!(listing, Listing::default());
    }

    #[tokio::test]
    async fn test_list_all_merges_seed_with_query() {
        let (_, pets) = controllers();
        for (name, age) in [("Rex", 3), ("Tom", 5), ("Kit", 7)] {
            pets.create(doc(json!({ "name": name, "age": age }))).await.unwrap();
        }

        let seed = Filter::new().and(Condition::gte("age", 4));
        let spec = QuerySpec::parse(&QueryParams::parse("age[lt]=7&sort=age").unwrap());
        let listing = pets.list_all(seed, spec).await.unwrap();
        assert_eq!(listing.count, 1);
        assert_eq!(listing.items[0]["name"], json!("Tom"));
        assert!(listing.items[0].get("_version").is_none());
    }

    #[tokio::test]
    async fn test_get_one_not_found_for_missing_and_malformed_ids() {
        let (_, pets) = controllers();
        for raw in [DocumentId::generate().to_string(), "not-an-id".to_string()] {
            let failure = pets.get_one(&raw).await.unwrap_err();
            assert_eq!(operational_kind(&failure), Some(ApiErrorKind::NotFound));
            assert_eq!(failure.to_string(), "No pet found with that id");
        }
    }

    #[tokio::test]
    async fn test_get_one_populates_single_relations() {
        let (owners, pets) = controllers();
        let owner = owners.create(doc(json!({ "name": "Ada" }))).await.unwrap();
        let pet = pets
            .create(doc(json!({ "name": "Rex", "owner": id(&owner) })))
            .await
            .unwrap();

        let fetched = pets.get_one(&id(&pet)).await.unwrap();
        assert_eq!(fetched["owner"]["name"], json!("Ada"));

        let listed = pets.list_all(Filter::new(), QuerySpec::default()).await.unwrap();
        assert!(listed.items[0]["owner"].is_string());
    }

    #[tokio::test]
    async fn test_create_surfaces_store_failures() {
        let (_, pets) = controllers();
        let failure = pets.create(Document::new()).await.unwrap_err();
        assert!(matches!(failure, Failure::Store(StoreError::Validation { .. })));

        pets.create(doc(json!({ "name": "Rex" }))).await.unwrap();
        let failure = pets.create(doc(json!({ "name": "Rex" }))).await.unwrap_err();
        assert!(matches!(failure, Failure::Store(StoreError::DuplicateKey { .. })));
    }

    #[tokio::test]
    async fn test_update_returns_post_update_record() {
        let (_, pets) = controllers();
        let pet = pets.create(doc(json!({ "name": "Rex", "age": 1 }))).await.unwrap();

        let updated = pets.update(&id(&pet), doc(json!({ "age": 2 }))).await.unwrap();
        assert_eq!(updated["age"], json!(2));
        assert_eq!(updated["name"], json!("Rex"));

        let failure = pets
            .update(&id(&pet), doc(json!({ "name": " " })))
            .await
            .unwrap_err();
        assert!(matches!(failure, Failure::Store(StoreError::Validation { .. })));

        let failure = pets
            .update(&DocumentId::generate().to_string(), doc(json!({ "age": 3 })))
            .await
            .unwrap_err();
        assert_eq!(operational_kind(&failure), Some(ApiErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_delete_then_not_found() {
        let (_, pets) = controllers();
        let pet = pets.create(doc(json!({ "name": "Rex" }))).await.unwrap();

        pets.delete(&id(&pet)).await.unwrap();
        let failure = pets.delete(&id(&pet)).await.unwrap_err();
        assert_eq!(operational_kind(&failure), Some(ApiErrorKind::NotFound));
    }
}
