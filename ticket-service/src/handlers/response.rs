//! Response envelopes for handler operations
//!
//! Successful responses share the envelope `{status: "success", data: {...}}`
//! where `data` is keyed by the entity name (single records) or the
//! collection name (lists). List responses also carry the `results` count.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use ticket_service::handlers::ListResponse;
//!
//! let response = ListResponse::new("tickets", Vec::new());
//! assert_eq!(
//!     serde_json::to_value(&response).unwrap(),
//!     json!({ "status": "success", "results": 0, "data": { "tickets": [] } })
//! );
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::Document;

/// Envelope status for successful responses
pub const SUCCESS: &str = "success";

/// Single value keyed by name: `{status, data: {<key>: value}}`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemResponse {
    pub status: &'static str,
    pub data: Map<String, Value>,
    #[serde(skip)]
    status_code: StatusCode,
}

impl ItemResponse {
    pub fn new(key: &str, value: impl Into<Value>) -> Self {
        let mut data = Map::new();
        data.insert(key.to_string(), value.into());
        Self {
            status: SUCCESS,
            data,
            status_code: StatusCode::OK,
        }
    }

    /// Respond with `201 Created`
    #[must_use]
    pub fn created(mut self) -> Self {
        self.status_code = StatusCode::CREATED;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl IntoResponse for ItemResponse {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

/// List of documents: `{status, results, data: {<collection>: [...]}}`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListResponse {
    pub status: &'static str,
    pub results: usize,
    pub data: Map<String, Value>,
}

impl ListResponse {
    pub fn new(key: &str, items: Vec<Document>) -> Self {
        let results = items.len();
        let mut data = Map::new();
        data.insert(
            key.to_string(),
            Value::Array(items.into_iter().map(Value::Object).collect()),
        );
        Self {
            status: SUCCESS,
            results,
            data,
        }
    }
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
