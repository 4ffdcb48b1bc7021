//! Request tracking middleware
//!
//! Every request gets an `x-request-id` (UUIDv7, time-sortable) unless the
//! caller supplied one, and the id is echoed on the response. Credentials are
//! marked sensitive so the trace layer never logs them.

use http::{HeaderName, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use uuid::Uuid;

/// Sensitive headers that should be masked in logs
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
];

/// Generates UUIDv7 request ids
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string();
        http::HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Assign a request id to requests that lack one
pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuidV7> {
    SetRequestIdLayer::x_request_id(MakeRequestUuidV7)
}

/// Copy the request id onto the response
pub fn request_id_propagation_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

pub fn sensitive_headers_layer() -> SetSensitiveRequestHeadersLayer {
    let headers = SENSITIVE_HEADERS
        .iter()
        .map(|name| HeaderName::from_static(name))
        .collect::<Vec<_>>();

    SetSensitiveRequestHeadersLayer::new(headers)
}
