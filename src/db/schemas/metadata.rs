//! Common metadata for all documents
//!
//! Tracks creation, update, and soft deletion timestamps.

use bson::DateTime;
use chrono::{DateTime as ChronoDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    /// Whether this document has been soft-deleted
    #[serde(default)]
    pub is_deleted: bool,

    /// When the document was soft-deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    /// When the document was last updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// When the document was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Metadata carrying domain timestamps
    pub fn with_timestamps(created_at: ChronoDateTime<Utc>, updated_at: ChronoDateTime<Utc>) -> Self {
        Self {
            is_deleted: false,
            deleted_at: None,
            updated_at: Some(DateTime::from_chrono(updated_at)),
            created_at: Some(DateTime::from_chrono(created_at)),
        }
    }

    /// Creation time as a domain timestamp (epoch if unset)
    pub fn created(&self) -> ChronoDateTime<Utc> {
        self.created_at.map(|t| t.to_chrono()).unwrap_or_default()
    }

    /// Last update time as a domain timestamp (epoch if unset)
    pub fn updated(&self) -> ChronoDateTime<Utc> {
        self.updated_at.map(|t| t.to_chrono()).unwrap_or_default()
    }
}
