//! Document identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StoreError;
use crate::schema::ID_FIELD;

/// Identifier of a stored document
///
/// Identifiers are time-ordered UUIDs (v7). Any UUID string is accepted when
/// parsing; anything else is a cast failure on the `id` path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| StoreError::Cast {
                path: ID_FIELD.to_string(),
                value: raw.to_string(),
                kind: "ObjectId".to_string(),
            })
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for DocumentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
