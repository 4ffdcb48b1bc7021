//! Ticket HTTP routes
//!
//! Mounted under `/api/v1/tickets`. Item reads and deletes reuse the generic
//! collection handlers; the generic partial update is not exposed, so status
//! changes only happen through the workflow routes. Unsupported methods on
//! known paths answer `RouteNotFound`.

use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::routing::{get, patch};
use axum::Router;
use serde_json::json;

use super::controller::TicketController;
use crate::handlers::routes::{create_handler, delete_handler, get_handler, read_query};
use crate::handlers::{route_not_found, Failure, ItemResponse, JsonBody, ListResponse};
use crate::store::DocumentStore;

/// Base path of the ticket routes
pub const TICKETS_PATH: &str = "/api/v1/tickets";

async fn list_tickets<S: DocumentStore>(
    State(tickets): State<Arc<TicketController<S>>>,
    RawQuery(raw): RawQuery,
) -> Result<ListResponse, Failure> {
    let listing = tickets.list_with_dates(read_query(raw)?).await?;
    Ok(ListResponse::new(tickets.resource().plural(), listing.items))
}

async fn take_in_work<S: DocumentStore>(
    State(tickets): State<Arc<TicketController<S>>>,
    Path(id): Path<String>,
) -> Result<ItemResponse, Failure> {
    let ticket = tickets.take_in_work(&id).await?;
    Ok(ItemResponse::new(tickets.resource().entity(), ticket))
}

async fn close_ticket<S: DocumentStore>(
    State(tickets): State<Arc<TicketController<S>>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<ItemResponse, Failure> {
    let ticket = tickets.close(&id, &body).await?;
    Ok(ItemResponse::new(tickets.resource().entity(), ticket))
}

async fn cancel_ticket<S: DocumentStore>(
    State(tickets): State<Arc<TicketController<S>>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<ItemResponse, Failure> {
    let ticket = tickets.cancel(&id, &body).await?;
    Ok(ItemResponse::new(tickets.resource().entity(), ticket))
}

async fn cancel_active_tickets<S: DocumentStore>(
    State(tickets): State<Arc<TicketController<S>>>,
) -> Result<ItemResponse, Failure> {
    let count = tickets.cancel_active().await?;
    Ok(ItemResponse::new("countCanceled", json!(count)))
}

/// Router for the ticket resource; nest it under [`TICKETS_PATH`]
pub fn ticket_routes<S: DocumentStore>(tickets: Arc<TicketController<S>>) -> Router {
    Router::new()
        .route(
            "/",
            get(list_tickets::<S>).post(create_handler::<TicketController<S>>),
        )
        .route("/take-ticket-in-work/{id}", patch(take_in_work::<S>))
        .route("/close-ticket/{id}", patch(close_ticket::<S>))
        .route("/cancel-ticket/{id}", patch(cancel_ticket::<S>))
        .route("/cancel-active-tickets", patch(cancel_active_tickets::<S>))
        .route(
            "/{id}",
            get(get_handler::<TicketController<S>>).delete(delete_handler::<TicketController<S>>),
        )
        .method_not_allowed_fallback(route_not_found)
        .with_state(tickets)
}
