//! Support ticket resource
//!
//! - [`model`]: the ticket schema and its [`TicketStatus`] lifecycle
//! - [`dates`]: `date` / `startDate` + `endDate` listing filters
//! - [`TicketController`]: workflow operations over the generic controller
//! - [`ticket_routes`]: the HTTP surface under `/api/v1/tickets`

pub mod dates;
mod controller;
pub mod model;
mod routes;

pub use controller::{
    TicketController, CANCEL_CAUSE_REQUIRED, CREATE_FIELDS, NOTHING_TO_CANCEL, SOLUTION_REQUIRED,
};
pub use dates::{date_range_filter, INVALID_DATE_MESSAGE};
pub use model::{ticket_schema, TicketStatus, TICKETS};
pub use routes::{ticket_routes, TICKETS_PATH};
