//! Ticket entity

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{EntitySchema, FieldSpec};

/// Collection holding tickets
pub const TICKETS: &str = "tickets";

/// Lifecycle state of a ticket
///
/// Tickets start as `NEW`. `CLOSED` and `CANCELED` are terminal; no
/// operation moves a ticket out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    New,
    Progress,
    Closed,
    Canceled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [Self::New, Self::Progress, Self::Closed, Self::Canceled];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Progress => "PROGRESS",
            Self::Closed => "CLOSED",
            Self::Canceled => "CANCELED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Canceled)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TicketStatus> for Value {
    fn from(status: TicketStatus) -> Self {
        Value::String(status.as_str().to_string())
    }
}

/// Field set of the `tickets` collection
pub fn ticket_schema() -> EntitySchema {
    EntitySchema::new(TICKETS)
        .field(
            FieldSpec::text("title")
                .required("A ticket must have a title")
                .trimmed(),
        )
        .field(
            FieldSpec::text("content")
                .required("A ticket must have content")
                .trimmed(),
        )
        .field(
            FieldSpec::choice("status", TicketStatus::ALL.map(TicketStatus::as_str))
                .default_value(TicketStatus::New),
        )
        .field(FieldSpec::text("solution"))
        .field(FieldSpec::text("cancelCause"))
        .field(FieldSpec::timestamp("createdAt").default_now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Document;
    use serde_json::json;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(TicketStatus::Progress).unwrap(), json!("PROGRESS"));
        assert_eq!(
            serde_json::from_value::<TicketStatus>(json!("CANCELED")).unwrap(),
            TicketStatus::Canceled
        );
        assert!(TicketStatus::Closed.is_terminal());
        assert!(!TicketStatus::Progress.is_terminal());
    }

    #[test]
    fn test_schema_defaults_new_ticket() {
        let mut payload = Document::new();
        payload.insert("title".into(), json!("  Printer jammed "));
        payload.insert("content".into(), json!("Paper stuck in tray 2"));

        let prepared = ticket_schema().prepare_insert(&payload).unwrap();
        assert_eq!(prepared["title"], json!("Printer jammed"));
        assert_eq!(prepared["status"], json!("NEW"));
        assert!(prepared["createdAt"].is_string());
        assert!(prepared.get("solution").is_none());
    }

    #[test]
    fn test_schema_rejects_unknown_status() {
        let mut payload = Document::new();
        payload.insert("title".into(), json!("t"));
        payload.insert("content".into(), json!("c"));
        payload.insert("status".into(), json!("ARCHIVED"));

        let errors = ticket_schema().prepare_insert(&payload).unwrap_err();
        assert!(errors.contains_key("status"));
    }

    #[test]
    fn test_allow_list_covers_ticket_fields() {
        let schema = ticket_schema();
        let allow_list = schema.allow_list();
        for field in ["id", "title", "content", "status", "solution", "cancelCause", "createdAt"] {
            assert!(allow_list.contains(&field), "{field} should be queryable");
        }
        assert!(!allow_list.contains(&"_version"));
    }
}
