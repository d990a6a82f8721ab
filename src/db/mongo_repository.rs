//! MongoDB-backed repositories

use bson::{doc, DateTime};
use tracing::debug;

use super::mongo::{MongoClient, MongoCollection};
use super::repository::{decode_cursor, next_cursor, ArticleRepository, AuthorRepository};
use super::schemas::{
    ArticleDoc, AuthorDoc, ARTICLE_COLLECTION, ARTICLE_SEQUENCE, AUTHOR_COLLECTION,
};
use crate::domain::{Article, Author};
use crate::types::{LecternError, Result};

fn article_not_found(id: i64) -> LecternError {
    LecternError::NotFound(format!("article {}", id))
}

/// [`ArticleRepository`] over the `articles` collection
pub struct MongoArticleRepository {
    client: MongoClient,
    articles: MongoCollection<ArticleDoc>,
}

impl MongoArticleRepository {
    /// Open the collection, creating its indexes
    pub async fn new(client: MongoClient) -> Result<Self> {
        let articles = client.collection::<ArticleDoc>(ARTICLE_COLLECTION).await?;
        Ok(Self { client, articles })
    }
}

#[async_trait::async_trait]
impl ArticleRepository for MongoArticleRepository {
    async fn fetch(&self, cursor: &str, num: i64) -> Result<(Vec<Article>, String)> {
        let after = decode_cursor(cursor)?;
        let page: Vec<Article> = self
            .articles
            .find_page(
                doc! { "article_id": { "$gt": after } },
                doc! { "article_id": 1 },
                num,
            )
            .await?
            .into_iter()
            .map(ArticleDoc::into_article)
            .collect();
        let next = next_cursor(&page, num);
        Ok((page, next))
    }

    async fn get_by_id(&self, id: i64) -> Result<Article> {
        self.articles
            .find_one(doc! { "article_id": id })
            .await?
            .map(ArticleDoc::into_article)
            .ok_or_else(|| article_not_found(id))
    }

    async fn get_by_title(&self, title: &str) -> Result<Article> {
        self.articles
            .find_one(doc! { "title": title })
            .await?
            .map(ArticleDoc::into_article)
            .ok_or_else(|| LecternError::NotFound(format!("article titled {:?}", title)))
    }

    async fn store(&self, article: &mut Article) -> Result<()> {
        article.id = self.client.next_sequence(ARTICLE_SEQUENCE).await?;
        self.articles
            .insert_one(ArticleDoc::from_article(article))
            .await?;
        debug!(article_id = article.id, "Article stored");
        Ok(())
    }

    async fn update(&self, article: &Article) -> Result<()> {
        let result = self
            .articles
            .update_one(
                doc! { "article_id": article.id },
                doc! {
                    "$set": {
                        "title": &article.title,
                        "body": &article.body,
                        "author_id": article.author.id,
                        "metadata.updated_at": DateTime::from_chrono(article.updated_at),
                    }
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(article_not_found(article.id));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = self.articles.soft_delete(doc! { "article_id": id }).await?;
        if result.matched_count == 0 {
            return Err(article_not_found(id));
        }
        Ok(())
    }

    async fn add_views(&self, id: i64, delta: i64) -> Result<()> {
        let result = self
            .articles
            .update_one(
                doc! { "article_id": id },
                doc! { "$inc": { "views": delta } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(article_not_found(id));
        }
        Ok(())
    }

    async fn set_views(&self, id: i64, views: i64) -> Result<()> {
        let result = self
            .articles
            .update_one(
                doc! { "article_id": id },
                doc! { "$set": { "views": views } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(article_not_found(id));
        }
        Ok(())
    }
}

/// [`AuthorRepository`] over the `authors` collection
pub struct MongoAuthorRepository {
    authors: MongoCollection<AuthorDoc>,
}

impl MongoAuthorRepository {
    /// Open the collection, creating its indexes
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let authors = client.collection::<AuthorDoc>(AUTHOR_COLLECTION).await?;
        Ok(Self { authors })
    }
}

#[async_trait::async_trait]
impl AuthorRepository for MongoAuthorRepository {
    async fn get_by_id(&self, id: i64) -> Result<Author> {
        self.authors
            .find_one(doc! { "author_id": id })
            .await?
            .map(AuthorDoc::into_author)
            .ok_or_else(|| LecternError::NotFound(format!("author {}", id)))
    }
}
