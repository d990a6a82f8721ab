//! Article document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::domain::{Article, Author};

/// Collection name for articles
pub const ARTICLE_COLLECTION: &str = "articles";

/// Sequence name used to assign numeric article ids
pub const ARTICLE_SEQUENCE: &str = "article_id";

/// Article document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ArticleDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Public numeric article id
    pub article_id: i64,

    pub title: String,

    pub body: String,

    /// Numeric id of the author document
    pub author_id: i64,

    /// Durable view count
    #[serde(default)]
    pub views: i64,
}

impl ArticleDoc {
    /// Build a document from a domain article
    pub fn from_article(article: &Article) -> Self {
        Self {
            _id: None,
            metadata: Metadata::with_timestamps(article.created_at, article.updated_at),
            article_id: article.id,
            title: article.title.clone(),
            body: article.body.clone(),
            author_id: article.author.id,
            views: article.views,
        }
    }

    /// Convert to a domain article with a bare author reference
    pub fn into_article(self) -> Article {
        Article {
            id: self.article_id,
            created_at: self.metadata.created(),
            updated_at: self.metadata.updated(),
            title: self.title,
            body: self.body,
            author: Author::reference(self.author_id),
            views: self.views,
        }
    }
}

impl IntoIndexes for ArticleDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "article_id": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            ),
            (doc! { "title": 1 }, None),
        ]
    }
}

impl MutMetadata for ArticleDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_article_round_trip_keeps_fields() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let article = Article {
            id: 12,
            title: "Atomic rename".into(),
            body: "..".into(),
            author: Author {
                id: 4,
                name: "Grace".into(),
                username: "grace".into(),
                ..Default::default()
            },
            created_at: ts,
            updated_at: ts,
            views: 30,
        };

        let back = ArticleDoc::from_article(&article).into_article();
        assert_eq!(back.id, 12);
        assert_eq!(back.views, 30);
        assert_eq!(back.created_at, ts);
        // author details are not persisted with the article
        assert_eq!(back.author, Author::reference(4));
    }
}
