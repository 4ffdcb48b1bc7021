//! Generic route handlers
//!
//! Each handler is generic over a [`CollectionHandler`] held in router state
//! and returns `Result<_, Failure>`, so every failure is forwarded to the
//! error normalizer rather than rendered locally.

use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use super::error::Failure;
use super::extract::JsonBody;
use super::normalizer::route_not_found;
use super::query::{QueryParams, QuerySpec};
use super::response::{ItemResponse, ListResponse};
use super::traits::CollectionHandler;
use crate::store::Filter;

/// Read the query string of a list request
pub fn read_query(raw: Option<String>) -> Result<QueryParams, Failure> {
    Ok(QueryParams::parse(raw.as_deref().unwrap_or_default())?)
}

pub async fn list_handler<H: CollectionHandler>(
    State(handler): State<Arc<H>>,
    RawQuery(raw): RawQuery,
) -> Result<ListResponse, Failure> {
    let spec = QuerySpec::parse(&read_query(raw)?);
    let listing = handler.list(Filter::new(), spec).await?;
    Ok(ListResponse::new(handler.collection_name(), listing.items))
}

pub async fn get_handler<H: CollectionHandler>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<ItemResponse, Failure> {
    let document = handler.get(&id).await?;
    Ok(ItemResponse::new(handler.entity_name(), document))
}

pub async fn create_handler<H: CollectionHandler>(
    State(handler): State<Arc<H>>,
    JsonBody(payload): JsonBody,
) -> Result<ItemResponse, Failure> {
    let document = handler.create(payload).await?;
    Ok(ItemResponse::new(handler.entity_name(), document).created())
}

pub async fn update_handler<H: CollectionHandler>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody,
) -> Result<ItemResponse, Failure> {
    let document = handler.update(&id, payload).await?;
    Ok(ItemResponse::new(handler.entity_name(), document))
}

pub async fn delete_handler<H: CollectionHandler>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<StatusCode, Failure> {
    handler.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mount all five operations: `/` for list and create, `/{id}` for the rest
///
/// Nest the returned router under the collection's base path. Any other
/// method on these paths is a `RouteNotFound`.
pub fn collection_routes<H: CollectionHandler>(handler: Arc<H>) -> Router {
    Router::new()
        .route("/", get(list_handler::<H>).post(create_handler::<H>))
        .route(
            "/{id}",
            get(get_handler::<H>)
                .patch(update_handler::<H>)
                .delete(delete_handler::<H>),
        )
        .method_not_allowed_fallback(route_not_found)
        .with_state(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeMode;
    use crate::handlers::{collect_failures, route_not_found, ErrorNormalizer, ResourceController};
    use crate::schema::{EntitySchema, FieldSpec};
    use crate::store::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::middleware;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let schema = Arc::new(
            EntitySchema::new("notes")
                .field(FieldSpec::text("text").required("A note needs text").trimmed())
                .field(FieldSpec::number("priority"))
                .field(FieldSpec::timestamp("createdAt").default_now()),
        );
        let store = Arc::new(MemoryStore::new().with_schema(Arc::clone(&schema)));
        let notes = Arc::new(ResourceController::new(store, schema, "note"));
        let normalizer = Arc::new(ErrorNormalizer::new(RuntimeMode::Production));

        Router::new()
            .nest("/api/v1/notes", collection_routes(notes))
            .fallback(route_not_found)
            .layer(middleware::from_fn_with_state(normalizer, collect_failures))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |value| Body::from(value.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let app = app();

        let (status, created) = call(&app, "POST", "/api/v1/notes", Some(json!({ "text": " hi ", "priority": 2 }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["data"]["note"]["text"], json!("hi"));
        let id = created["data"]["note"]["id"].as_str().unwrap().to_string();

        let (status, listed) = call(&app, "GET", "/api/v1/notes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["results"], json!(1));
        assert_eq!(listed["data"]["notes"][0]["id"], json!(id));

        let (status, updated) = call(&app, "PATCH", &format!("/api/v1/notes/{id}"), Some(json!({ "priority": 5 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["data"]["note"]["priority"], json!(5));

        let (status, fetched) = call(&app, "GET", &format!("/api/v1/notes/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["data"]["note"]["priority"], json!(5));

        let (status, body) = call(&app, "DELETE", &format!("/api/v1/notes/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, missing) = call(&app, "GET", &format!("/api/v1/notes/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(missing["message"], json!("No note found with that id"));
        assert_eq!(missing["nameError"], json!("NotFound"));
    }

    #[tokio::test]
    async fn test_create_validation_envelope() {
        let app = app();
        let (status, body) = call(&app, "POST", "/api/v1/notes", Some(json!({ "priority": "high" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], json!("fail"));
        assert_eq!(body["nameError"], json!("ValidationFailed"));
        assert!(body["errorMessages"]["text"].is_string());
        assert!(body["errorMessages"]["priority"].is_string());
    }

    #[tokio::test]
    async fn test_cast_error_on_filter_value() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/v1/notes?priority[gt]=lots", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["nameError"], json!("CastError"));
        assert_eq!(body["message"], json!("Invalid priority: lots"));
    }

    #[tokio::test]
    async fn test_unmatched_route() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/v1/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["nameError"], json!("RouteNotFound"));
        assert_eq!(body["message"], json!("Can't find /api/v1/nowhere on this server!"));
    }

    #[tokio::test]
    async fn test_unsupported_method_is_route_not_found() {
        let app = app();
        let (status, body) = call(&app, "PUT", "/api/v1/notes", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["nameError"], json!("RouteNotFound"));
        assert_eq!(body["message"], json!("Can't find /api/v1/notes on this server!"));

        let (status, body) = call(&app, "POST", "/api/v1/notes/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Can't find /api/v1/notes/abc on this server!"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/notes")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
