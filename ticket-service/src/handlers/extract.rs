//! Request body extraction

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use super::error::{ApiError, Failure};
use crate::schema::Document;

/// JSON object body, decoded without a content-type check
///
/// An empty body reads as an empty object. Anything that is not a JSON
/// object is a `BadRequest`, and a body over the size limit is a
/// `PayloadTooLarge`, both routed through the error normalizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonBody(pub Document);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge.into_response(),
                _ => rejection.into_response(),
            })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(Document::new()));
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(document)) => Ok(Self(document)),
            Ok(_) => Err(reject("Request body must be a JSON object")),
            Err(error) => Err(reject(format!("Invalid JSON body: {error}"))),
        }
    }
}

fn reject(message: impl Into<String>) -> Response {
    Failure::from(ApiError::bad_request(message)).into_response()
}
