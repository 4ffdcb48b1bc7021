//! Generic REST resource framework
//!
//! This module turns any [`EntitySchema`](crate::schema::EntitySchema) into a
//! REST resource:
//!
//! - [`QuerySpec`]: typed reading of a list request's query string
//! - [`QueryFeatures`]: pipeline composing a store query from a spec and the
//!   entity's allow-list
//! - [`ResourceController`] / [`CollectionHandler`]: the five CRUD operations
//! - [`ErrorNormalizer`]: boundary rendering of every [`Failure`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use axum::{middleware, Router};
//! use ticket_service::handlers::{
//!     collect_failures, collection_routes, route_not_found, ErrorNormalizer, ResourceController,
//! };
//!
//! let books = Arc::new(ResourceController::new(store, book_schema, "book"));
//! let app = Router::new()
//!     .nest("/api/v1/books", collection_routes(books))
//!     .fallback(route_not_found)
//!     .layer(middleware::from_fn_with_state(
//!         Arc::new(ErrorNormalizer::new(mode)),
//!         collect_failures,
//!     ));
//! ```

mod controller;
mod error;
mod extract;
mod features;
mod normalizer;
mod query;
mod response;
pub mod routes;
mod traits;

pub use controller::{Listing, PopulateDirective, ResourceController};
pub use error::{ApiError, ApiErrorKind, ApiOperation, AuthFailure, Failure, ForwardedFailure};
pub use extract::JsonBody;
pub use features::{QueryFeatures, DEFAULT_SORT_FIELD};
pub use normalizer::{
    collect_failures, envelope_rejections, route_not_found, ErrorNormalizer, NormalizedError,
    StatusClass, GENERIC_FAILURE_MESSAGE,
};
pub use query::{
    ComparisonClause, ComparisonOp, FieldSelection, QueryParams, QuerySpec, DEFAULT_PAGE,
    DEFAULT_PAGE_SIZE, RESERVED_KEYS,
};
pub use response::{ItemResponse, ListResponse, SUCCESS};
pub use routes::collection_routes;
pub use traits::CollectionHandler;
