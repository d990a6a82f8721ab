//! Article and author records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author snapshot embedded in an article
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Author {
    /// Author reference carrying only the id (details filled in later)
    pub fn reference(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// An article as served to readers.
///
/// This is also the cached snapshot format: a flat record with RFC 3339
/// timestamps and no version tag. Changing the shape invalidates every live
/// cache entry, which the short cache TTL makes acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// View count. Pending-since-last-flush when returned by the read path.
    #[serde(default)]
    pub views: i64,
}

impl Article {
    /// Create a new article draft (id assigned on store)
    pub fn new(title: impl Into<String>, body: impl Into<String>, author_id: i64) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            author: Author::reference(author_id),
            ..Default::default()
        }
    }
}
