//! Author document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::domain::Author;

/// Collection name for authors
pub const AUTHOR_COLLECTION: &str = "authors";

/// Author document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AuthorDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Public numeric author id
    pub author_id: i64,

    /// Display name
    pub name: String,

    /// Login name
    pub username: String,
}

impl AuthorDoc {
    pub fn into_author(self) -> Author {
        Author {
            id: self.author_id,
            created_at: self.metadata.created(),
            updated_at: self.metadata.updated(),
            name: self.name,
            username: self.username,
        }
    }
}

impl IntoIndexes for AuthorDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "author_id": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            ),
            (
                doc! { "username": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            ),
        ]
    }
}

impl MutMetadata for AuthorDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
