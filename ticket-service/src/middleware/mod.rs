//! HTTP middleware

pub mod request_tracking;
pub mod security_headers;

pub use request_tracking::{
    request_id_layer, request_id_propagation_layer, sensitive_headers_layer, MakeRequestUuidV7,
    SENSITIVE_HEADERS,
};
pub use security_headers::apply_security_headers;
