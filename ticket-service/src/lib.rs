//! # ticket-service
//!
//! A generic REST resource framework over a document store, and a support
//! ticket service built with it.
//!
//! ## Features
//!
//! - **Resource controllers**: list, get, create, update and delete for any
//!   [`EntitySchema`](schema::EntitySchema), behind the
//!   [`CollectionHandler`](handlers::CollectionHandler) trait
//! - **Query pipeline**: `field[gte]=`, `sort`, `fields`, `page` and `limit`
//!   parsed once into a [`QuerySpec`](handlers::QuerySpec) and applied in a fixed order
//! - **Error normalization**: one boundary renders every failure, hiding
//!   internals in production
//! - **Ticket workflow**: take-in-work, close, cancel and bulk cancel, with
//!   creation-date filters
//! - **Graceful shutdown**: SIGTERM, SIGINT, or a panic that escapes a handler
//!
//! ## Example
//!
//! ```rust,no_run
//! use ticket_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::builder().config(config.clone()).build().await?;
//!     let app = build_router(&state);
//!
//!     Server::new(config).serve(app).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod observability;
pub mod schema;
pub mod server;
pub mod state;
pub mod store;
pub mod tickets;

/// Common imports
pub mod prelude {
    pub use crate::config::{
        Config, MiddlewareConfig, RuntimeMode, SecurityHeadersConfig, ServiceConfig, StoreConfig,
    };
    pub use crate::error::{Error, Result};
    pub use crate::handlers::{
        collect_failures, collection_routes, route_not_found, ApiError, ApiErrorKind,
        CollectionHandler, ErrorNormalizer, Failure, ItemResponse, ListResponse, QueryParams,
        QuerySpec, ResourceController,
    };
    pub use crate::health::health;
    pub use crate::observability::{init_tracing, shutdown_tracing};
    pub use crate::schema::{Document, EntitySchema, FieldSpec};
    pub use crate::server::{build_router, FatalSignal, Server};
    pub use crate::state::AppState;
    pub use crate::store::{DocumentStore, MemoryStore};
    pub use crate::tickets::{ticket_routes, TicketController, TicketStatus};

    pub use axum::{
        routing::{delete, get, patch, post},
        Router,
    };
    pub use tokio;
}
