//! Service-level error types
//!
//! These cover process concerns: configuration, seed data, binding and
//! serving. Request failures use [`Failure`](crate::handlers::Failure) and are
//! rendered by the error normalizer instead.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using the crate's error type
pub type Result<T> = std::result::Result<T, Error>;

/// Startup and lifecycle errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or extracted
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Seed file unreadable or not a JSON array of objects
    #[error("Seed file {path}: {reason}")]
    Seed { path: PathBuf, reason: String },

    /// Seed document rejected by the store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Listener could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server stopped after a fatal condition
    #[error("Fatal: {0}")]
    Fatal(String),
}

impl From<figment::Error> for Error {
    fn from(error: figment::Error) -> Self {
        Self::Config(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_error_display() {
        let error = Error::Seed {
            path: PathBuf::from("/tmp/seed.json"),
            reason: "expected an array".to_string(),
        };
        assert_eq!(error.to_string(), "Seed file /tmp/seed.json: expected an array");
    }

    #[test]
    fn test_figment_error_is_boxed() {
        let error = Error::from(figment::Error::from("missing field `name`".to_string()));
        assert!(matches!(error, Error::Config(_)));
        assert!(error.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_bind_error_keeps_source() {
        let error = Error::Bind {
            address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(std::error::Error::source(&error).is_some());
    }
}
