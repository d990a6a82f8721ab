//! Database schemas for Lectern
//!
//! MongoDB document structures for articles and authors.

mod article;
mod author;
mod metadata;

pub use article::{ArticleDoc, ARTICLE_COLLECTION, ARTICLE_SEQUENCE};
pub use author::{AuthorDoc, AUTHOR_COLLECTION};
pub use metadata::Metadata;
