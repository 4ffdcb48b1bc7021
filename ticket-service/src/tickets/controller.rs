//! Ticket workflow
//!
//! [`TicketController`] wraps the generic [`ResourceController`] for the
//! `tickets` collection and adds the state transitions of a support ticket.

use std::sync::Arc;

use serde_json::Value;

use super::dates::date_range_filter;
use super::model::TicketStatus;
use crate::handlers::{
    ApiError, CollectionHandler, Failure, Listing, QueryParams, QuerySpec, ResourceController,
};
use crate::schema::{Document, EntitySchema};
use crate::store::{Condition, DocumentStore, Filter};

/// Fields a client may set when opening a ticket
pub const CREATE_FIELDS: [&str; 2] = ["title", "content"];

pub const SOLUTION_REQUIRED: &str = "A solution is required to close a ticket!";
pub const CANCEL_CAUSE_REQUIRED: &str = "A cancellation cause is required to cancel a ticket!";
pub const NOTHING_TO_CANCEL: &str = "No tickets to cancel";

/// Support ticket operations over a [`DocumentStore`]
pub struct TicketController<S> {
    resource: ResourceController<S>,
}

impl<S> Clone for TicketController<S> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

impl<S: DocumentStore> TicketController<S> {
    /// Controller over `store`, which must have the ticket schema registered
    pub fn new(store: Arc<S>, schema: Arc<EntitySchema>) -> Self {
        Self {
            resource: ResourceController::new(store, schema, "ticket"),
        }
    }

    pub fn resource(&self) -> &ResourceController<S> {
        &self.resource
    }

    /// List tickets, honouring `date` / `startDate` + `endDate`
    pub async fn list_with_dates(&self, mut params: QueryParams) -> Result<Listing, Failure> {
        let seed = date_range_filter(&mut params)?;
        self.resource.list_all(seed, QuerySpec::parse(&params)).await
    }

    /// Open a ticket from its title and content; other keys are ignored
    pub async fn open(&self, payload: Document) -> Result<Document, Failure> {
        let payload = payload
            .into_iter()
            .filter(|(key, _)| CREATE_FIELDS.contains(&key.as_str()))
            .collect();
        self.resource.create(payload).await
    }

    /// Move a ticket to `PROGRESS`, whatever its current state
    pub async fn take_in_work(&self, id: &str) -> Result<Document, Failure> {
        self.transition(id, TicketStatus::Progress, None).await
    }

    /// Close a ticket with the `solution` given in `body`
    pub async fn close(&self, id: &str, body: &Document) -> Result<Document, Failure> {
        let solution = required(body, "solution", SOLUTION_REQUIRED)?;
        self.transition(id, TicketStatus::Closed, Some(("solution", solution)))
            .await
    }

    /// Cancel a ticket with the `cancelCause` given in `body`
    pub async fn cancel(&self, id: &str, body: &Document) -> Result<Document, Failure> {
        let cause = required(body, "cancelCause", CANCEL_CAUSE_REQUIRED)?;
        self.transition(id, TicketStatus::Canceled, Some(("cancelCause", cause)))
            .await
    }

    /// Cancel every ticket in `PROGRESS`, returning how many changed
    ///
    /// No cancellation cause is recorded on the affected tickets.
    pub async fn cancel_active(&self) -> Result<u64, Failure> {
        let filter = Filter::new().and(Condition::eq("status", TicketStatus::Progress));
        let mut patch = Document::new();
        patch.insert("status".to_string(), TicketStatus::Canceled.into());

        let summary = self.resource.update_many(&filter, patch).await?;
        if summary.modified == 0 {
            return Err(ApiError::not_found(NOTHING_TO_CANCEL).into());
        }
        tracing::info!(count = summary.modified, "canceled active tickets");
        Ok(summary.modified)
    }

    async fn transition(
        &self,
        id: &str,
        status: TicketStatus,
        detail: Option<(&str, Value)>,
    ) -> Result<Document, Failure> {
        let mut patch = Document::new();
        patch.insert("status".to_string(), status.into());
        if let Some((field, value)) = detail {
            patch.insert(field.to_string(), value);
        }

        let ticket = self.resource.update(id, patch).await?;
        tracing::info!(%id, %status, terminal = status.is_terminal(), "ticket transitioned");
        Ok(ticket)
    }
}

/// Value of `field`, treating absent, null, `false` and blank text as missing
fn required(body: &Document, field: &str, message: &str) -> Result<Value, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {
            Err(ApiError::field_required(field, message))
        }
        Some(Value::String(text)) if text.trim().is_empty() => {
            Err(ApiError::field_required(field, message))
        }
        Some(value) => Ok(value.clone()),
    }
}

impl<S: DocumentStore> CollectionHandler for TicketController<S> {
    fn entity_name(&self) -> &str {
        self.resource.entity()
    }

    fn collection_name(&self) -> &str {
        self.resource.plural()
    }

    async fn list(&self, seed: Filter, spec: QuerySpec) -> Result<Listing, Failure> {
        self.resource.list_all(seed, spec).await
    }

    async fn get(&self, id: &str) -> Result<Document, Failure> {
        self.resource.get_one(id).await
    }

    async fn create(&self, payload: Document) -> Result<Document, Failure> {
        self.open(payload).await
    }

    async fn update(&self, id: &str, payload: Document) -> Result<Document, Failure> {
        self.resource.update(id, payload).await
    }

    async fn delete(&self, id: &str) -> Result<(), Failure> {
        self.resource.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ApiErrorKind;
    use crate::schema::ID_FIELD;
    use crate::store::MemoryStore;
    use crate::tickets::ticket_schema;
    use serde_json::json;

    fn controller() -> TicketController<MemoryStore> {
        let schema = Arc::new(ticket_schema());
        let store = Arc::new(MemoryStore::new().with_schema(Arc::clone(&schema)));
        TicketController::new(store, schema)
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    async fn open(tickets: &TicketController<MemoryStore>, title: &str) -> String {
        let ticket = tickets
            .open(doc(json!({ "title": title, "content": "details" })))
            .await
            .unwrap();
        ticket[ID_FIELD].as_str().unwrap().to_string()
    }

    fn kind(failure: &Failure) -> Option<ApiErrorKind> {
        match failure {
            Failure::Operational(error) => Some(error.kind()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_open_ignores_extra_fields() {
        let tickets = controller();
        let ticket = tickets
            .open(doc(json!({
                "title": "VPN down",
                "content": "cannot connect",
                "status": "CLOSED",
                "solution": "none"
            })))
            .await
            .unwrap();

        assert_eq!(ticket["status"], json!("NEW"));
        assert!(ticket.get("solution").is_none());
    }

    #[tokio::test]
    async fn test_take_in_work_is_idempotent() {
        let tickets = controller();
        let id = open(&tickets, "VPN down").await;

        for _ in 0..2 {
            let ticket = tickets.take_in_work(&id).await.unwrap();
            assert_eq!(ticket["status"], json!("PROGRESS"));
        }
    }

    #[tokio::test]
    async fn test_close_requires_solution() {
        let tickets = controller();
        let id = open(&tickets, "VPN down").await;
        tickets.take_in_work(&id).await.unwrap();

        for body in [json!({}), json!({ "solution": null }), json!({ "solution": "  " })] {
            let failure = tickets.close(&id, &doc(body)).await.unwrap_err();
            assert_eq!(kind(&failure), Some(ApiErrorKind::ValidationFailed));
            assert_eq!(failure.to_string(), SOLUTION_REQUIRED);
        }
        assert_eq!(tickets.resource().get_one(&id).await.unwrap()["status"], json!("PROGRESS"));

        let closed = tickets
            .close(&id, &doc(json!({ "solution": "Restarted the gateway" })))
            .await
            .unwrap();
        assert_eq!(closed["status"], json!("CLOSED"));
        assert_eq!(closed["solution"], json!("Restarted the gateway"));
    }

    #[tokio::test]
    async fn test_cancel_requires_cause() {
        let tickets = controller();
        let id = open(&tickets, "VPN down").await;

        let failure = tickets.cancel(&id, &Document::new()).await.unwrap_err();
        assert_eq!(failure.to_string(), CANCEL_CAUSE_REQUIRED);

        let canceled = tickets
            .cancel(&id, &doc(json!({ "cancelCause": "duplicate" })))
            .await
            .unwrap();
        assert_eq!(canceled["status"], json!("CANCELED"));
        assert_eq!(canceled["cancelCause"], json!("duplicate"));
    }

    #[tokio::test]
    async fn test_workflow_end_states_are_terminal() {
        let tickets = controller();
        let status = |ticket: &Document| {
            serde_json::from_value::<TicketStatus>(ticket["status"].clone()).unwrap()
        };

        let closed = open(&tickets, "closed").await;
        let ticket = tickets.take_in_work(&closed).await.unwrap();
        assert!(!status(&ticket).is_terminal());
        let ticket = tickets
            .close(&closed, &doc(json!({ "solution": "done" })))
            .await
            .unwrap();
        assert!(status(&ticket).is_terminal());

        let canceled = open(&tickets, "canceled").await;
        let ticket = tickets
            .cancel(&canceled, &doc(json!({ "cancelCause": "duplicate" })))
            .await
            .unwrap();
        assert!(status(&ticket).is_terminal());
    }

    #[tokio::test]
    async fn test_transition_on_missing_ticket() {
        let tickets = controller();
        let failure = tickets.take_in_work("0190f5a8-0000-7000-8000-000000000000").await.unwrap_err();
        assert_eq!(kind(&failure), Some(ApiErrorKind::NotFound));
        assert_eq!(failure.to_string(), "No ticket found with that id");
    }

    #[tokio::test]
    async fn test_cancel_active_counts_only_progress() {
        let tickets = controller();
        let failure = tickets.cancel_active().await.unwrap_err();
        assert_eq!(kind(&failure), Some(ApiErrorKind::NotFound));
        assert_eq!(failure.to_string(), NOTHING_TO_CANCEL);

        let first = open(&tickets, "one").await;
        let second = open(&tickets, "two").await;
        open(&tickets, "three").await;
        tickets.take_in_work(&first).await.unwrap();
        tickets.take_in_work(&second).await.unwrap();

        assert_eq!(tickets.cancel_active().await.unwrap(), 2);
        let canceled = tickets.resource().get_one(&first).await.unwrap();
        assert_eq!(canceled["status"], json!("CANCELED"));
        assert!(canceled.get("cancelCause").is_none());

        assert!(tickets.cancel_active().await.is_err());
    }

    #[tokio::test]
    async fn test_list_rejects_malformed_date() {
        let tickets = controller();
        let failure = tickets
            .list_with_dates(QueryParams::parse("date=31-12-2024").unwrap())
            .await
            .unwrap_err();
        assert_eq!(kind(&failure), Some(ApiErrorKind::BadRequest));
    }

    #[tokio::test]
    async fn test_list_by_todays_date() {
        let tickets = controller();
        open(&tickets, "today").await;

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let listing = tickets
            .list_with_dates(QueryParams::from_pairs([("date", today)]))
            .await
            .unwrap();
        assert_eq!(listing.count, 1);

        let listing = tickets
            .list_with_dates(QueryParams::from_pairs([("date", "2001-01-01")]))
            .await
            .unwrap();
        assert_eq!(listing.count, 0);
    }
}
