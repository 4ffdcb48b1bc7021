//! API error types for handler operations
//!
//! [`ApiError`] is the operational taxonomy: failures anticipated by the
//! application and safe to describe to clients. [`Failure`] is everything a
//! handler can fail with, operational or not. Handlers return `Failure`; its
//! `IntoResponse` impl forwards the failure to the
//! [`collect_failures`](super::collect_failures) boundary, which renders it
//! through the [`ErrorNormalizer`](super::ErrorNormalizer).
//!
//! # Example
//!
//! ```rust
//! use ticket_service::handlers::{ApiError, ApiErrorKind, Failure};
//!
//! let error = ApiError::entity_not_found("ticket");
//! assert_eq!(error.kind(), ApiErrorKind::NotFound);
//! assert_eq!(error.to_string(), "No ticket found with that id");
//!
//! let failure = Failure::from(error);
//! assert!(failure.is_operational());
//! ```

use std::error::Error as _;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::schema::FieldErrors;
use crate::store::StoreError;

/// Operation being performed when a failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Get => write!(f, "get"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Discriminator of a normalized error, rendered as `nameError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ApiErrorKind {
    NotFound,
    ValidationFailed,
    DuplicateKey,
    CastError,
    InvalidToken,
    TokenExpired,
    RouteNotFound,
    BadRequest,
    PayloadTooLarge,
    RequestTimeout,
    Unexpected,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "NotFound",
            Self::ValidationFailed => "ValidationFailed",
            Self::DuplicateKey => "DuplicateKey",
            Self::CastError => "CastError",
            Self::InvalidToken => "InvalidToken",
            Self::TokenExpired => "TokenExpired",
            Self::RouteNotFound => "RouteNotFound",
            Self::BadRequest => "BadRequest",
            Self::PayloadTooLarge => "PayloadTooLarge",
            Self::RequestTimeout => "RequestTimeout",
            Self::Unexpected => "Unexpected",
        };
        f.write_str(name)
    }
}

impl ApiErrorKind {
    /// Get the HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound | Self::CastError | Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::ValidationFailed | Self::DuplicateKey | Self::BadRequest => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidToken | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Operational error, raised deliberately where it is detected
///
/// One payload shape per kind; the message is always safe to show to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    ValidationFailed {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("{message}")]
    DuplicateKey { message: String, field: String },

    #[error("{message}")]
    CastError { message: String },

    #[error("Invalid token. Please log in again!")]
    InvalidToken,

    #[error("Your token has expired! Please log in again.")]
    TokenExpired,

    #[error("Can't find {path} on this server!")]
    RouteNotFound { path: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("Request body is too large!")]
    PayloadTooLarge,

    #[error("Request took too long to complete!")]
    RequestTimeout,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Not-found error naming the entity type
    pub fn entity_not_found(entity: &str) -> Self {
        Self::not_found(format!("No {entity} found with that id"))
    }

    pub fn validation_failed(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            field_errors,
        }
    }

    /// Validation failure for a single missing field
    pub fn field_required(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = FieldErrors::new();
        field_errors.insert(field.to_string(), message.clone());
        Self::validation_failed(message, field_errors)
    }

    pub fn duplicate_key(field: impl Into<String>, value: &str) -> Self {
        let field = field.into();
        Self::DuplicateKey {
            message: format!("Field '{field}' with value '{value}' already exists!"),
            field,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn route_not_found(path: impl Into<String>) -> Self {
        Self::RouteNotFound { path: path.into() }
    }

    pub const fn kind(&self) -> ApiErrorKind {
        match self {
            Self::NotFound { .. } => ApiErrorKind::NotFound,
            Self::ValidationFailed { .. } => ApiErrorKind::ValidationFailed,
            Self::DuplicateKey { .. } => ApiErrorKind::DuplicateKey,
            Self::CastError { .. } => ApiErrorKind::CastError,
            Self::InvalidToken => ApiErrorKind::InvalidToken,
            Self::TokenExpired => ApiErrorKind::TokenExpired,
            Self::RouteNotFound { .. } => ApiErrorKind::RouteNotFound,
            Self::BadRequest { .. } => ApiErrorKind::BadRequest,
            Self::PayloadTooLarge => ApiErrorKind::PayloadTooLarge,
            Self::RequestTimeout => ApiErrorKind::RequestTimeout,
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }
}

/// Failure of an authentication token check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("jwt malformed: {0}")]
    Malformed(String),

    #[error("jwt expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },
}

/// Anything a handler can fail with
///
/// Only [`Failure::Operational`] is operational. The other variants carry
/// raw failures whose kind is re-derived by the normalizer.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Operational(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl Failure {
    pub const fn is_operational(&self) -> bool {
        matches!(self, Self::Operational(_))
    }

    /// The failure's message followed by each underlying source
    pub fn chain(&self) -> Vec<String> {
        match self {
            Self::Unexpected(error) => error.chain().map(ToString::to_string).collect(),
            other => {
                let mut chain = vec![other.to_string()];
                let mut source = other.source();
                while let Some(cause) = source {
                    chain.push(cause.to_string());
                    source = cause.source();
                }
                chain
            }
        }
    }
}

/// Failure carried in response extensions to the boundary collector
#[derive(Debug, Clone)]
pub struct ForwardedFailure(pub Arc<Failure>);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(ForwardedFailure(Arc::new(self)));
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        Failure::from(self).into_response()
    }
}
