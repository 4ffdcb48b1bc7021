//! In-memory document engine
//!
//! Collections live behind a single `tokio::sync::RwLock`, so every store
//! call is atomic and writes are serialized in arrival order. Documents are
//! kept in identifier order, which is creation order for generated ids and
//! serves as the final tie-breaker when sorting.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use super::document::DocumentId;
use super::error::{StoreError, StoreOperation};
use super::query::{DocumentQuery, Filter, Projection, SortDirection, SortKey, StoreOperator};
use super::traits::{DocumentStore, StoreResult, UpdateSummary};
use crate::schema::{display_value, Document, EntitySchema, FieldKind, FieldSpec, ID_FIELD, VERSION_FIELD};

struct Collection {
    schema: Arc<EntitySchema>,
    documents: BTreeMap<DocumentId, Document>,
}

impl Collection {
    fn new(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            documents: BTreeMap::new(),
        }
    }

    fn ensure_unique(&self, candidate: &Document, own_id: Option<&DocumentId>) -> StoreResult<()> {
        for spec in self.schema.unique_fields() {
            let Some(value) = candidate.get(&spec.name).filter(|value| !value.is_null()) else {
                continue;
            };
            let clash = self
                .documents
                .iter()
                .any(|(id, existing)| Some(id) != own_id && existing.get(&spec.name) == Some(value));
            if clash {
                return Err(StoreError::DuplicateKey {
                    collection: self.schema.collection().to_string(),
                    field: spec.name.clone(),
                    value: display_value(value),
                });
            }
        }
        Ok(())
    }
}

/// A [`DocumentStore`] holding every collection in process memory
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection while building the store
    #[must_use]
    pub fn with_schema(mut self, schema: Arc<EntitySchema>) -> Self {
        self.collections
            .get_mut()
            .insert(schema.collection().to_string(), Collection::new(schema));
        self
    }

    /// Register a collection on a running store
    ///
    /// Re-registering an existing collection replaces its schema and keeps
    /// its documents.
    pub async fn register(&self, schema: Arc<EntitySchema>) {
        let mut collections = self.collections.write().await;
        match collections.get_mut(schema.collection()) {
            Some(existing) => existing.schema = schema,
            None => {
                collections.insert(schema.collection().to_string(), Collection::new(schema));
            }
        }
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |target| target.documents.len())
    }

    /// Insert every document, stopping at the first failure
    pub async fn seed(&self, collection: &str, documents: Vec<Document>) -> StoreResult<usize> {
        let mut inserted = 0;
        for document in documents {
            self.insert(collection, document).await?;
            inserted += 1;
        }
        tracing::info!(collection, inserted, "seeded collection");
        Ok(inserted)
    }
}

fn lookup<'a>(
    collections: &'a HashMap<String, Collection>,
    name: &str,
    operation: StoreOperation,
) -> StoreResult<&'a Collection> {
    collections
        .get(name)
        .ok_or_else(|| StoreError::unknown_collection(operation, name))
}

fn lookup_mut<'a>(
    collections: &'a mut HashMap<String, Collection>,
    name: &str,
    operation: StoreOperation,
) -> StoreResult<&'a mut Collection> {
    collections
        .get_mut(name)
        .ok_or_else(|| StoreError::unknown_collection(operation, name))
}

impl DocumentStore for MemoryStore {
    async fn find(&self, query: &DocumentQuery) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let target = lookup(&collections, query.collection(), StoreOperation::Find)?;
        let predicates = compile(&target.schema, query.filter_ref())?;

        let mut matched: Vec<&Document> = target
            .documents
            .values()
            .filter(|document| satisfies(document, &predicates))
            .collect();
        matched.sort_by(|a, b| order(a, b, query.sort_keys()));

        let (skip, limit) = match query.pagination() {
            Some(window) => (
                usize::try_from(window.skip).unwrap_or(usize::MAX),
                usize::try_from(window.limit).unwrap_or(usize::MAX),
            ),
            None => (0, usize::MAX),
        };

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| {
                let mut projected = project(document, query.projection());
                resolve_references(
                    &mut projected,
                    &target.schema,
                    &collections,
                    query.populate_paths(),
                );
                projected
            })
            .collect())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
        populate: &[String],
    ) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;
        let target = lookup(&collections, collection, StoreOperation::FindById)?;

        Ok(target.documents.get(id).map(|document| {
            let mut found = document.clone();
            resolve_references(&mut found, &target.schema, &collections, populate);
            found
        }))
    }

    async fn insert(&self, collection: &str, payload: Document) -> StoreResult<Document> {
        let mut collections = self.collections.write().await;
        let target = lookup_mut(&mut collections, collection, StoreOperation::Insert)?;

        let mut document = target
            .schema
            .prepare_insert(&payload)
            .map_err(|errors| StoreError::validation(collection, errors))?;
        let id = DocumentId::generate();
        document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        document.insert(VERSION_FIELD.to_string(), Value::from(0));

        target.ensure_unique(&document, None)?;
        target.documents.insert(id, document.clone());
        tracing::debug!(collection, %id, "document inserted");
        Ok(document)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Document,
    ) -> StoreResult<Option<Document>> {
        let mut collections = self.collections.write().await;
        let target = lookup_mut(&mut collections, collection, StoreOperation::UpdateById)?;

        let changes = target
            .schema
            .prepare_update(&patch)
            .map_err(|errors| StoreError::validation(collection, errors))?;
        let Some(existing) = target.documents.get(id) else {
            return Ok(None);
        };

        let mut updated = existing.clone();
        apply_changes(&mut updated, &changes);
        target.ensure_unique(&updated, Some(id))?;
        target.documents.insert(*id, updated.clone());
        tracing::debug!(collection, %id, fields = changes.len(), "document updated");
        Ok(Some(updated))
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
    ) -> StoreResult<UpdateSummary> {
        let mut collections = self.collections.write().await;
        let target = lookup_mut(&mut collections, collection, StoreOperation::UpdateMany)?;

        let changes = target
            .schema
            .prepare_update(&patch)
            .map_err(|errors| StoreError::validation(collection, errors))?;
        let predicates = compile(&target.schema, filter)?;
        let matching: Vec<DocumentId> = target
            .documents
            .iter()
            .filter(|(_, document)| satisfies(document, &predicates))
            .map(|(id, _)| *id)
            .collect();

        let mut summary = UpdateSummary {
            matched: matching.len() as u64,
            modified: 0,
        };
        for id in matching {
            let Some(existing) = target.documents.get(&id) else {
                continue;
            };
            let mut updated = existing.clone();
            apply_changes(&mut updated, &changes);
            if &updated == existing {
                continue;
            }
            target.ensure_unique(&updated, Some(&id))?;
            target.documents.insert(id, updated);
            summary.modified += 1;
        }

        tracing::debug!(
            collection,
            matched = summary.matched,
            modified = summary.modified,
            "bulk update applied"
        );
        Ok(summary)
    }

    async fn delete_by_id(&self, collection: &str, id: &DocumentId) -> StoreResult<Option<Document>> {
        let mut collections = self.collections.write().await;
        let target = lookup_mut(&mut collections, collection, StoreOperation::DeleteById)?;
        Ok(target.documents.remove(id))
    }
}

/// A filter condition with its operand cast to the stored representation
struct Predicate {
    field: String,
    operator: StoreOperator,
    operand: Value,
}

fn compile(schema: &EntitySchema, filter: &Filter) -> StoreResult<Vec<Predicate>> {
    filter
        .conditions()
        .iter()
        .map(|condition| -> StoreResult<Predicate> {
            Ok(Predicate {
                field: condition.field.clone(),
                operator: condition.operator,
                operand: schema.cast_filter_value(&condition.field, &condition.value)?,
            })
        })
        .collect()
}

fn satisfies(document: &Document, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|predicate| {
        let stored = document.get(&predicate.field).filter(|value| !value.is_null());
        let ordering = stored.and_then(|value| compare(value, &predicate.operand));
        match predicate.operator {
            StoreOperator::Eq => ordering == Some(Ordering::Equal),
            StoreOperator::Ne => ordering != Some(Ordering::Equal),
            StoreOperator::Gt => ordering == Some(Ordering::Greater),
            StoreOperator::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            StoreOperator::Lt => ordering == Some(Ordering::Less),
            StoreOperator::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    })
}

/// Compare two values of the same type; values of different types are unordered
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn order(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = a.get(&key.field);
        let right = b.get(&key.field);
        let ordering = type_rank(left).cmp(&type_rank(right)).then_with(|| {
            match (left, right) {
                (Some(l), Some(r)) => compare(l, r).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            }
        });
        let ordering = match key.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn project(document: &Document, projection: &Projection) -> Document {
    match projection {
        Projection::All => document.clone(),
        Projection::Include(fields) => document
            .iter()
            .filter(|(key, _)| key.as_str() == ID_FIELD || fields.iter().any(|field| field == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        Projection::Exclude(fields) => document
            .iter()
            .filter(|(key, _)| !fields.iter().any(|field| field == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}

fn apply_changes(document: &mut Document, changes: &Document) {
    for (key, value) in changes {
        if value.is_null() {
            document.remove(key);
        } else {
            document.insert(key.clone(), value.clone());
        }
    }
}

/// Replace reference ids with the referenced documents
///
/// Dangling references resolve to `null`. Paths that are not reference
/// fields, or are absent from the document, are left alone.
fn resolve_references(
    document: &mut Document,
    schema: &EntitySchema,
    collections: &HashMap<String, Collection>,
    paths: &[String],
) {
    for path in paths {
        let Some(FieldSpec {
            kind: FieldKind::Reference(target),
            ..
        }) = schema.field_spec(path)
        else {
            continue;
        };
        let Some(Value::String(raw)) = document.get(path) else {
            continue;
        };

        let resolved = DocumentId::parse(raw)
            .ok()
            .and_then(|id| collections.get(target)?.documents.get(&id))
            .map(|referenced| Value::Object(project(referenced, &Projection::default())))
            .unwrap_or(Value::Null);
        document.insert(path.clone(), resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use crate::store::query::{Condition, Pagination};
    use serde_json::json;

    fn authors() -> Arc<EntitySchema> {
        Arc::new(
            EntitySchema::new("authors")
                .field(FieldSpec::text("name").required("An author needs a name").unique()),
        )
    }

    fn books() -> Arc<EntitySchema> {
        Arc::new(
            EntitySchema::new("books")
                .field(FieldSpec::text("title").required("A book must have a title"))
                .field(FieldSpec::number("pages"))
                .field(FieldSpec::choice("state", ["DRAFT", "PUBLISHED"]).default_value("DRAFT"))
                .field(FieldSpec::reference("author", "authors")),
        )
    }

    fn store() -> MemoryStore {
        MemoryStore::new().with_schema(authors()).with_schema(books())
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    fn id_of(document: &Document) -> DocumentId {
        DocumentId::parse(document[ID_FIELD].as_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_version() {
        let store = store();
        let book = store
            .insert("books", doc(json!({ "title": "Dune", "pages": 412 })))
            .await
            .unwrap();

        assert!(book[ID_FIELD].is_string());
        assert_eq!(book[VERSION_FIELD], json!(0));
        assert_eq!(book["state"], json!("DRAFT"));
        assert_eq!(store.count("books").await, 1);
    }

    #[tokio::test]
    async fn test_insert_reports_validation_and_duplicates() {
        let store = store();
        let error = store.insert("books", Document::new()).await.unwrap_err();
        assert!(matches!(error, StoreError::Validation { ref errors, .. } if errors.contains_key("title")));

        store
            .insert("authors", doc(json!({ "name": "Herbert" })))
            .await
            .unwrap();
        let error = store
            .insert("authors", doc(json!({ "name": "Herbert" })))
            .await
            .unwrap_err();
        assert_eq!(
            error,
            StoreError::DuplicateKey {
                collection: "authors".to_string(),
                field: "name".to_string(),
                value: "Herbert".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let store = store();
        let error = store
            .find(&DocumentQuery::new("movies"))
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::UnknownCollection { .. }));
    }

    #[tokio::test]
    async fn test_find_filters_with_cast_operands() {
        let store = store();
        for (title, pages) in [("A", 100), ("B", 200), ("C", 300)] {
            store
                .insert("books", doc(json!({ "title": title, "pages": pages })))
                .await
                .unwrap();
        }

        let query = DocumentQuery::new("books")
            .filter(Filter::new().and(Condition::gte("pages", "200")))
            .sort(vec![SortKey::ascending("pages")]);
        let found = store.find(&query).await.unwrap();
        let titles: Vec<_> = found.iter().map(|d| d["title"].clone()).collect();
        assert_eq!(titles, vec![json!("B"), json!("C")]);
    }

    #[tokio::test]
    async fn test_ne_matches_documents_missing_the_field() {
        let store = store();
        store
            .insert("books", doc(json!({ "title": "A", "pages": 10 })))
            .await
            .unwrap();
        store
            .insert("books", doc(json!({ "title": "B" })))
            .await
            .unwrap();

        let query = DocumentQuery::new("books").filter(Filter::new().and(Condition::ne("pages", 10)));
        let found = store.find(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["title"], json!("B"));
    }

    #[tokio::test]
    async fn test_find_rejects_uncastable_operand() {
        let store = store();
        let query = DocumentQuery::new("books")
            .filter(Filter::new().and(Condition::gt("pages", "many")));
        let error = store.find(&query).await.unwrap_err();
        assert!(matches!(error, StoreError::Cast { ref path, .. } if path == "pages"));
    }

    #[tokio::test]
    async fn test_find_sorts_with_tie_breakers_and_paginates() {
        let store = store();
        for (title, pages) in [("A", 2), ("B", 1), ("C", 2), ("D", 1)] {
            store
                .insert("books", doc(json!({ "title": title, "pages": pages })))
                .await
                .unwrap();
        }

        let query = DocumentQuery::new("books")
            .sort(vec![SortKey::descending("pages"), SortKey::ascending("title")])
            .paginate(Pagination::page(2, 2));
        let found = store.find(&query).await.unwrap();
        let titles: Vec<_> = found.iter().map(|d| d["title"].clone()).collect();
        assert_eq!(titles, vec![json!("B"), json!("D")]);

        let beyond = DocumentQuery::new("books").paginate(Pagination::page(5, 2));
        assert!(store.find(&beyond).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_projection() {
        let store = store();
        store
            .insert("books", doc(json!({ "title": "A", "pages": 5 })))
            .await
            .unwrap();

        let include = DocumentQuery::new("books").project(Projection::Include(vec!["title".into()]));
        let found = store.find(&include).await.unwrap();
        let keys: Vec<_> = found[0].keys().cloned().collect();
        assert_eq!(keys, vec!["id".to_string(), "title".to_string()]);

        let exclude = DocumentQuery::new("books").project(Projection::default());
        let found = store.find(&exclude).await.unwrap();
        assert!(!found[0].contains_key(VERSION_FIELD));
        assert!(found[0].contains_key("pages"));
    }

    #[tokio::test]
    async fn test_populate_resolves_references() {
        let store = store();
        let author = store
            .insert("authors", doc(json!({ "name": "Herbert" })))
            .await
            .unwrap();
        let book = store
            .insert(
                "books",
                doc(json!({ "title": "Dune", "author": author[ID_FIELD].clone() })),
            )
            .await
            .unwrap();

        let plain = store
            .find_by_id("books", &id_of(&book), &[])
            .await
            .unwrap()
            .unwrap();
        assert!(plain["author"].is_string());

        let populated = store
            .find_by_id("books", &id_of(&book), &["author".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(populated["author"]["name"], json!("Herbert"));
        assert!(populated["author"].get(VERSION_FIELD).is_none());

        store.delete_by_id("authors", &id_of(&author)).await.unwrap();
        let dangling = store
            .find(&DocumentQuery::new("books").populate(vec!["author".to_string()]))
            .await
            .unwrap();
        assert_eq!(dangling[0]["author"], Value::Null);
    }

    #[tokio::test]
    async fn test_update_by_id_validates_and_returns_post_update() {
        let store = store();
        let book = store
            .insert("books", doc(json!({ "title": "Dune" })))
            .await
            .unwrap();
        let id = id_of(&book);

        let updated = store
            .update_by_id("books", &id, doc(json!({ "state": "PUBLISHED", "pages": "412" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["state"], json!("PUBLISHED"));
        assert_eq!(updated["pages"], json!(412));

        let error = store
            .update_by_id("books", &id, doc(json!({ "state": "LOST" })))
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::Validation { .. }));

        let missing = store
            .update_by_id("books", &DocumentId::generate(), doc(json!({ "pages": 1 })))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_many_counts_modified() {
        let store = store();
        for title in ["A", "B", "C"] {
            store
                .insert("books", doc(json!({ "title": title })))
                .await
                .unwrap();
        }
        let published = store
            .update_many(
                "books",
                &Filter::new().and(Condition::eq("title", "A")),
                doc(json!({ "state": "PUBLISHED" })),
            )
            .await
            .unwrap();
        assert_eq!(published, UpdateSummary { matched: 1, modified: 1 });

        let all = store
            .update_many("books", &Filter::new(), doc(json!({ "state": "PUBLISHED" })))
            .await
            .unwrap();
        assert_eq!(all, UpdateSummary { matched: 3, modified: 2 });
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let store = store();
        let book = store
            .insert("books", doc(json!({ "title": "Dune" })))
            .await
            .unwrap();
        let id = id_of(&book);

        assert!(store.delete_by_id("books", &id).await.unwrap().is_some());
        assert!(store.delete_by_id("books", &id).await.unwrap().is_none());
        assert_eq!(store.count("books").await, 0);
    }

    #[tokio::test]
    async fn test_seed_inserts_all() {
        let store = store();
        let inserted = store
            .seed(
                "books",
                vec![doc(json!({ "title": "A" })), doc(json!({ "title": "B" }))],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.count("books").await, 2);
    }
}
