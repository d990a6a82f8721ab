//! Durable repository capabilities
//!
//! The services only see these traits; MongoDB and in-memory
//! implementations live alongside.

use crate::domain::{Article, Author};
use crate::types::{LecternError, Result};

/// Durable article storage
#[async_trait::async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Page of articles after an opaque cursor (empty = from the start).
    ///
    /// Returns the page and the cursor for the next one; the cursor is empty
    /// when the page came back short.
    async fn fetch(&self, cursor: &str, num: i64) -> Result<(Vec<Article>, String)>;

    /// Article by id. The author is a bare reference.
    async fn get_by_id(&self, id: i64) -> Result<Article>;

    /// Article by exact title
    async fn get_by_title(&self, title: &str) -> Result<Article>;

    /// Insert a new article, assigning its id
    async fn store(&self, article: &mut Article) -> Result<()>;

    /// Replace title, body, author and `updated_at`
    async fn update(&self, article: &Article) -> Result<()>;

    /// Remove an article
    async fn delete(&self, id: i64) -> Result<()>;

    /// Add `delta` to the durable view count
    async fn add_views(&self, id: i64, delta: i64) -> Result<()>;

    /// Overwrite the durable view count
    async fn set_views(&self, id: i64, views: i64) -> Result<()>;
}

/// Durable author lookup
#[async_trait::async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Author>;
}

/// Decode a repository cursor (the last id of the previous page)
pub(crate) fn decode_cursor(cursor: &str) -> Result<i64> {
    if cursor.is_empty() {
        return Ok(0);
    }
    match cursor.parse::<i64>() {
        Ok(after) if after >= 0 => Ok(after),
        _ => Err(LecternError::BadRequest(format!("invalid cursor: {}", cursor))),
    }
}

/// Encode the next-page cursor for a page of `num` requested items
pub(crate) fn next_cursor(page: &[Article], num: i64) -> String {
    match page.last() {
        Some(last) if page.len() as i64 == num => last.id.to_string(),
        _ => String::new(),
    }
}
