//! Error normalization at the HTTP boundary
//!
//! Every [`Failure`] returned by a handler travels in the response extensions
//! to [`collect_failures`], which hands it to the [`ErrorNormalizer`]. The
//! normalizer re-derives a [`NormalizedError`] from the failure's shape and
//! renders it according to the [`RuntimeMode`] it was constructed with.
//!
//! Production responses use the envelope
//! `{status, message, nameError?, errorMessages?, fieldDublicate?}`, and a
//! non-operational failure is always reduced to a fixed message.
//! Development responses add the full `error` object and the `stack` of
//! source messages.

use std::sync::Arc;

use axum::extract::{OriginalUri, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::error::{ApiError, ApiErrorKind, AuthFailure, Failure, ForwardedFailure};
use crate::config::RuntimeMode;
use crate::schema::FieldErrors;
use crate::store::StoreError;

/// Message shown for non-operational failures in production
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong!";

/// `"fail"` for client errors, `"error"` for everything else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    Fail,
    Error,
}

impl StatusClass {
    pub fn of(status: StatusCode) -> Self {
        if status.is_client_error() {
            Self::Fail
        } else {
            Self::Error
        }
    }
}

/// A failure re-derived into the API error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedError {
    pub status_code: u16,
    pub status_class: StatusClass,
    pub is_operational: bool,
    pub message: String,
    pub kind: ApiErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_field: Option<String>,
}

impl NormalizedError {
    fn new(kind: ApiErrorKind, message: impl Into<String>, is_operational: bool) -> Self {
        let status = kind.status_code();
        Self {
            status_code: status.as_u16(),
            status_class: StatusClass::of(status),
            is_operational,
            message: message.into(),
            kind,
            field_errors: None,
            duplicate_field: None,
        }
    }

    fn operational(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, true)
    }

    fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unexpected, message, false)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<&ApiError> for NormalizedError {
    fn from(error: &ApiError) -> Self {
        let mut normalized = Self::operational(error.kind(), error.to_string());
        match error {
            ApiError::ValidationFailed { field_errors, .. } => {
                normalized.field_errors = Some(field_errors.clone());
            }
            ApiError::DuplicateKey { field, .. } => {
                normalized.duplicate_field = Some(field.clone());
            }
            _ => {}
        }
        normalized
    }
}

#[derive(Serialize)]
struct ProductionEnvelope<'a> {
    status: StatusClass,
    message: &'a str,
    #[serde(rename = "nameError", skip_serializing_if = "Option::is_none")]
    name_error: Option<ApiErrorKind>,
    #[serde(rename = "errorMessages", skip_serializing_if = "Option::is_none")]
    error_messages: Option<&'a FieldErrors>,
    #[serde(rename = "fieldDublicate", skip_serializing_if = "Option::is_none")]
    field_duplicate: Option<&'a str>,
}

#[derive(Serialize)]
struct DevelopmentError<'a> {
    #[serde(flatten)]
    normalized: &'a NormalizedError,
    raw: String,
}

#[derive(Serialize)]
struct DevelopmentEnvelope<'a> {
    status: StatusClass,
    error: DevelopmentError<'a>,
    message: String,
    stack: Vec<String>,
}

/// Renders failures into responses for one runtime mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorNormalizer {
    mode: RuntimeMode,
}

impl ErrorNormalizer {
    pub const fn new(mode: RuntimeMode) -> Self {
        Self { mode }
    }

    pub const fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Re-derive the API error kind from the failure's shape
    pub fn normalize(&self, failure: &Failure) -> NormalizedError {
        match failure {
            Failure::Operational(error) => NormalizedError::from(error),
            Failure::Store(StoreError::Cast { path, value, .. }) => NormalizedError::operational(
                ApiErrorKind::CastError,
                format!("Invalid {path}: {value}"),
            ),
            Failure::Store(StoreError::DuplicateKey { field, value, .. }) => {
                NormalizedError::from(&ApiError::duplicate_key(field.clone(), value))
            }
            Failure::Store(StoreError::Validation { errors, .. }) => {
                let joined = errors.values().cloned().collect::<Vec<_>>().join(". ");
                NormalizedError::from(&ApiError::validation_failed(
                    format!("Invalid input data! {joined}"),
                    errors.clone(),
                ))
            }
            Failure::Store(
                error @ (StoreError::UnknownCollection { .. } | StoreError::Unavailable { .. }),
            ) => NormalizedError::unexpected(error.to_string()),
            Failure::Auth(AuthFailure::Malformed(_)) => {
                NormalizedError::from(&ApiError::InvalidToken)
            }
            Failure::Auth(AuthFailure::Expired { .. }) => {
                NormalizedError::from(&ApiError::TokenExpired)
            }
            Failure::Unexpected(error) => NormalizedError::unexpected(error.to_string()),
        }
    }

    /// Log and render a failure
    pub fn render(&self, failure: &Failure) -> Response {
        let normalized = self.normalize(failure);

        if normalized.is_operational {
            tracing::warn!(
                kind = %normalized.kind,
                status = normalized.status_code,
                message = %normalized.message,
                "request failed"
            );
        } else {
            tracing::error!(
                kind = %normalized.kind,
                status = normalized.status_code,
                error = ?failure,
                "unexpected failure"
            );
        }

        match self.mode {
            RuntimeMode::Development => Self::render_development(failure, &normalized),
            RuntimeMode::Production => Self::render_production(&normalized),
        }
    }

    fn render_production(normalized: &NormalizedError) -> Response {
        if !normalized.is_operational {
            let body = ProductionEnvelope {
                status: StatusClass::Error,
                message: GENERIC_FAILURE_MESSAGE,
                name_error: None,
                error_messages: None,
                field_duplicate: None,
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }

        let body = ProductionEnvelope {
            status: normalized.status_class,
            message: &normalized.message,
            name_error: Some(normalized.kind),
            error_messages: normalized.field_errors.as_ref(),
            field_duplicate: normalized.duplicate_field.as_deref(),
        };
        (normalized.status(), Json(body)).into_response()
    }

    fn render_development(failure: &Failure, normalized: &NormalizedError) -> Response {
        let body = DevelopmentEnvelope {
            status: normalized.status_class,
            error: DevelopmentError {
                normalized,
                raw: format!("{failure:?}"),
            },
            message: failure.to_string(),
            stack: failure.chain(),
        };
        (normalized.status(), Json(body)).into_response()
    }
}

/// Boundary collector rendering forwarded failures
///
/// Install with `axum::middleware::from_fn_with_state` over the whole router,
/// fallback included.
pub async fn collect_failures(
    State(normalizer): State<Arc<ErrorNormalizer>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    match response.extensions().get::<ForwardedFailure>().cloned() {
        Some(ForwardedFailure(failure)) => normalizer.render(&failure),
        None => response,
    }
}

/// Envelope the bare 408 and 413 answers of the timeout and body-limit layers
///
/// Install with `axum::middleware::map_response_with_state` outside those
/// layers. Responses that already carry a JSON body pass through.
pub async fn envelope_rejections(
    State(normalizer): State<Arc<ErrorNormalizer>>,
    response: Response,
) -> Response {
    let error = match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge,
        StatusCode::REQUEST_TIMEOUT => ApiError::RequestTimeout,
        _ => return response,
    };
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if is_json {
        return response;
    }
    normalizer.render(&Failure::from(error))
}

/// Fallback for unmatched paths and unsupported methods
///
/// Reports the full request path, also from inside a nested router.
pub async fn route_not_found(OriginalUri(uri): OriginalUri) -> Failure {
    ApiError::route_not_found(uri.path()).into()
}
