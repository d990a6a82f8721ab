//! Shared test doubles for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lectern::cache::{
    CacheBackend, CacheBackendError, CacheConfig, CounterBuffer, MemoryBackend, ObjectCache,
};
use lectern::db::{
    ArticleRepository, AuthorRepository, InMemoryArticleRepository, InMemoryAuthorRepository,
};
use lectern::domain::{Article, Author};
use lectern::services::{ArticleService, ReadConfig};
use lectern::Result;

// ============================================================================
// Cache backend with failure switches
// ============================================================================

/// [`MemoryBackend`] whose reads and increments can be made to fail
#[derive(Default)]
pub struct FlakyBackend {
    pub inner: MemoryBackend,
    pub fail_get: AtomicBool,
    pub fail_incr: AtomicBool,
    /// Fail the next `hgetall` only
    pub fail_hgetall_once: AtomicBool,
    /// Delay every `set_ex` by this many seconds
    pub set_delay_secs: AtomicU64,
}

impl FlakyBackend {
    fn down() -> CacheBackendError {
        CacheBackendError::Unavailable("connection refused".into())
    }
}

#[async_trait::async_trait]
impl CacheBackend for FlakyBackend {
    async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, CacheBackendError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        self.inner.get(key).await
    }

    async fn set_ex(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> std::result::Result<(), CacheBackendError> {
        let delay = self.set_delay_secs.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }
        self.inner.set_ex(key, value, ttl).await
    }

    async fn del(&self, key: &str) -> std::result::Result<bool, CacheBackendError> {
        self.inner.del(key).await
    }

    async fn hincr_by(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> std::result::Result<i64, CacheBackendError> {
        if self.fail_incr.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        self.inner.hincr_by(key, field, delta).await
    }

    async fn rename(&self, key: &str, new_key: &str) -> std::result::Result<bool, CacheBackendError> {
        self.inner.rename(key, new_key).await
    }

    async fn hgetall(
        &self,
        key: &str,
    ) -> std::result::Result<HashMap<String, String>, CacheBackendError> {
        if self.fail_hgetall_once.swap(false, Ordering::SeqCst) {
            return Err(Self::down());
        }
        self.inner.hgetall(key).await
    }
}

// ============================================================================
// Repositories with call counters
// ============================================================================

/// [`InMemoryArticleRepository`] that counts reads and view writes
#[derive(Default)]
pub struct CountingArticleRepository {
    pub inner: InMemoryArticleRepository,
    pub get_calls: AtomicUsize,
    pub add_views_calls: AtomicUsize,
    pub set_views_calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ArticleRepository for CountingArticleRepository {
    async fn fetch(&self, cursor: &str, num: i64) -> Result<(Vec<Article>, String)> {
        self.inner.fetch(cursor, num).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Article> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_id(id).await
    }

    async fn get_by_title(&self, title: &str) -> Result<Article> {
        self.inner.get_by_title(title).await
    }

    async fn store(&self, article: &mut Article) -> Result<()> {
        self.inner.store(article).await
    }

    async fn update(&self, article: &Article) -> Result<()> {
        self.inner.update(article).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn add_views(&self, id: i64, delta: i64) -> Result<()> {
        self.add_views_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.add_views(id, delta).await
    }

    async fn set_views(&self, id: i64, views: i64) -> Result<()> {
        self.set_views_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set_views(id, views).await
    }
}

/// [`InMemoryAuthorRepository`] that counts lookups
#[derive(Default)]
pub struct CountingAuthorRepository {
    pub inner: InMemoryAuthorRepository,
    pub get_calls: AtomicUsize,
}

#[async_trait::async_trait]
impl AuthorRepository for CountingAuthorRepository {
    async fn get_by_id(&self, id: i64) -> Result<Author> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_id(id).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub backend: Arc<FlakyBackend>,
    pub articles: Arc<CountingArticleRepository>,
    pub authors: Arc<CountingAuthorRepository>,
    pub cache: Arc<ObjectCache>,
    pub counters: Arc<CounterBuffer>,
    pub service: ArticleService,
}

impl Harness {
    /// Service over fresh doubles, with author 1 present
    pub async fn new() -> Self {
        let backend = Arc::new(FlakyBackend::default());
        let articles = Arc::new(CountingArticleRepository::default());
        let authors = Arc::new(CountingAuthorRepository::default());
        authors
            .inner
            .insert(Author {
                id: 1,
                name: "Ada Lovelace".into(),
                username: "ada".into(),
                ..Default::default()
            })
            .await;

        let cache = Arc::new(ObjectCache::new(backend.clone(), &CacheConfig::default()));
        let counters = Arc::new(CounterBuffer::new(backend.clone()));
        let service = ArticleService::new(
            articles.clone(),
            authors.clone(),
            cache.clone(),
            counters.clone(),
            ReadConfig::default(),
        );

        Self {
            backend,
            articles,
            authors,
            cache,
            counters,
            service,
        }
    }

    /// Store an article directly in the repository
    pub async fn seed(&self, title: &str, views: i64) -> i64 {
        let mut article = Article::new(title, "body", 1);
        self.articles.inner.store(&mut article).await.unwrap();
        self.articles.inner.set_views(article.id, views).await.unwrap();
        article.id
    }
}
