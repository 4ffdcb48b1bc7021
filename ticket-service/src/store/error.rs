//! Document store error types
//!
//! Errors keep the shape of the underlying failure (cast, duplicate key,
//! validation) so the error normalizer can re-derive an API error kind from
//! them without string matching.

use std::fmt;

use thiserror::Error;

use crate::schema::{CastFailure, FieldErrors};

/// Operation being performed when the store error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Find,
    FindById,
    Insert,
    UpdateById,
    UpdateMany,
    DeleteById,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find => write!(f, "find"),
            Self::FindById => write!(f, "find_by_id"),
            Self::Insert => write!(f, "insert"),
            Self::UpdateById => write!(f, "update_by_id"),
            Self::UpdateMany => write!(f, "update_many"),
            Self::DeleteById => write!(f, "delete_by_id"),
        }
    }
}

/// Failure reported by a [`DocumentStore`](super::DocumentStore)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A filter operand or identifier could not be cast to the field type
    #[error("Cast to {kind} failed for value \"{value}\" at path \"{path}\"")]
    Cast {
        path: String,
        value: String,
        kind: String,
    },

    /// A unique index rejected the write
    #[error("E11000 duplicate key error collection: {collection} index: {field}_1 dup key: {{ {field}: \"{value}\" }}")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },

    /// Schema validators rejected the write
    #[error("{collection} validation failed: {}", summarize(.errors))]
    Validation {
        collection: String,
        errors: FieldErrors,
    },

    /// No schema registered under the collection name
    #[error("collection `{collection}` is not registered (during {operation})")]
    UnknownCollection {
        operation: StoreOperation,
        collection: String,
    },

    /// The backend could not serve the request
    #[error("store unavailable during {operation}: {message}")]
    Unavailable {
        operation: StoreOperation,
        message: String,
    },
}

impl StoreError {
    pub fn validation(collection: impl Into<String>, errors: FieldErrors) -> Self {
        Self::Validation {
            collection: collection.into(),
            errors,
        }
    }

    pub fn unknown_collection(operation: StoreOperation, collection: impl Into<String>) -> Self {
        Self::UnknownCollection {
            operation,
            collection: collection.into(),
        }
    }

    pub fn unavailable(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            message: message.into(),
        }
    }
}

impl From<CastFailure> for StoreError {
    fn from(failure: CastFailure) -> Self {
        Self::Cast {
            path: failure.path,
            value: failure.value,
            kind: failure.kind.to_string(),
        }
    }
}

fn summarize(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}
