//! In-memory repositories
//!
//! Back dev mode (no MongoDB) and the test suites.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::RwLock;

use super::repository::{decode_cursor, next_cursor, ArticleRepository, AuthorRepository};
use crate::domain::{Article, Author};
use crate::types::{LecternError, Result};

fn article_not_found(id: i64) -> LecternError {
    LecternError::NotFound(format!("article {}", id))
}

/// In-memory [`ArticleRepository`], ordered by id
pub struct InMemoryArticleRepository {
    articles: RwLock<BTreeMap<i64, Article>>,
    next_id: AtomicI64,
}

impl InMemoryArticleRepository {
    pub fn new() -> Self {
        Self {
            articles: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Durable view count of an article, if it exists
    pub async fn views(&self, id: i64) -> Option<i64> {
        self.articles.read().await.get(&id).map(|a| a.views)
    }
}

impl Default for InMemoryArticleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ArticleRepository for InMemoryArticleRepository {
    async fn fetch(&self, cursor: &str, num: i64) -> Result<(Vec<Article>, String)> {
        let after = decode_cursor(cursor)?;
        let Some(first) = after.checked_add(1) else {
            return Ok((Vec::new(), String::new()));
        };
        let limit = usize::try_from(num).unwrap_or(0);
        let page: Vec<Article> = self
            .articles
            .read()
            .await
            .range(first..)
            .take(limit)
            .map(|(_, a)| a.clone())
            .collect();
        let next = next_cursor(&page, num);
        Ok((page, next))
    }

    async fn get_by_id(&self, id: i64) -> Result<Article> {
        self.articles
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| article_not_found(id))
    }

    async fn get_by_title(&self, title: &str) -> Result<Article> {
        self.articles
            .read()
            .await
            .values()
            .find(|a| a.title == title)
            .cloned()
            .ok_or_else(|| LecternError::NotFound(format!("article titled {:?}", title)))
    }

    async fn store(&self, article: &mut Article) -> Result<()> {
        article.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = article.clone();
        stored.author = Author::reference(article.author.id);
        self.articles.write().await.insert(article.id, stored);
        Ok(())
    }

    async fn update(&self, article: &Article) -> Result<()> {
        let mut articles = self.articles.write().await;
        let existing = articles
            .get_mut(&article.id)
            .ok_or_else(|| article_not_found(article.id))?;
        existing.title = article.title.clone();
        existing.body = article.body.clone();
        existing.author = Author::reference(article.author.id);
        existing.updated_at = article.updated_at;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.articles
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| article_not_found(id))
    }

    async fn add_views(&self, id: i64, delta: i64) -> Result<()> {
        let mut articles = self.articles.write().await;
        let article = articles.get_mut(&id).ok_or_else(|| article_not_found(id))?;
        article.views += delta;
        Ok(())
    }

    async fn set_views(&self, id: i64, views: i64) -> Result<()> {
        let mut articles = self.articles.write().await;
        let article = articles.get_mut(&id).ok_or_else(|| article_not_found(id))?;
        article.views = views;
        Ok(())
    }
}

/// In-memory [`AuthorRepository`]
#[derive(Default)]
pub struct InMemoryAuthorRepository {
    authors: RwLock<HashMap<i64, Author>>,
}

impl InMemoryAuthorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an author
    pub async fn insert(&self, author: Author) {
        self.authors.write().await.insert(author.id, author);
    }
}

#[async_trait::async_trait]
impl AuthorRepository for InMemoryAuthorRepository {
    async fn get_by_id(&self, id: i64) -> Result<Author> {
        self.authors
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| LecternError::NotFound(format!("author {}", id)))
    }
}
