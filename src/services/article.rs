//! Article service
//!
//! Orchestrates the durable repositories, the snapshot cache and the view
//! counter buffer.
//!
//! ## Read path
//!
//! ```text
//! get_by_id(id)
//!   │
//!   ├─ ObjectCache::get ── hit ──────────────────────────┐
//!   │        │                                           │
//!   │   miss / cache error (warn)                        │
//!   │        ▼                                           │
//!   │   ArticleRepository::get_by_id + author fill       │
//!   │   (errors propagate)                               ▼
//!   ├─ CounterBuffer::increment ── views = pending total (error: warn, keep base)
//!   │
//!   ├─ detached, tracked task: threshold set_views / cache fill
//!   │
//!   └─ return
//! ```
//!
//! Only repository failures reach the caller. Cache and counter failures are
//! logged and absorbed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::cache::{CounterBuffer, ObjectCache};
use crate::db::{ArticleRepository, AuthorRepository};
use crate::domain::{Article, Author};
use crate::types::{LecternError, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Default pending-view count at which the durable count is set directly
pub const DEFAULT_VIEW_FLUSH_THRESHOLD: i64 = 10;

/// Smallest page size served by `fetch`
pub const MIN_PAGE_SIZE: i64 = 10;

/// Largest page size served by `fetch`
pub const MAX_PAGE_SIZE: i64 = 100;

/// Read path configuration
#[derive(Debug, Clone)]
pub struct ReadConfig {
    /// Write the pending total to the durable count whenever it is a
    /// multiple of this value
    pub view_flush_threshold: i64,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            view_flush_threshold: DEFAULT_VIEW_FLUSH_THRESHOLD,
        }
    }
}

/// Clamp a requested page size into `[MIN_PAGE_SIZE, MAX_PAGE_SIZE]`
pub fn clamp_page_size(num: i64) -> i64 {
    if num <= 0 {
        MIN_PAGE_SIZE
    } else {
        num.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }
}

// ============================================================================
// Service
// ============================================================================

/// Article operations over injected storage capabilities
pub struct ArticleService {
    articles: Arc<dyn ArticleRepository>,
    authors: Arc<dyn AuthorRepository>,
    cache: Arc<ObjectCache>,
    counters: Arc<CounterBuffer>,
    background: TaskTracker,
    background_waiters: Mutex<()>,
    config: ReadConfig,
}

impl ArticleService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        authors: Arc<dyn AuthorRepository>,
        cache: Arc<ObjectCache>,
        counters: Arc<CounterBuffer>,
        config: ReadConfig,
    ) -> Self {
        Self {
            articles,
            authors,
            cache,
            counters,
            background: TaskTracker::new(),
            background_waiters: Mutex::new(()),
            config,
        }
    }

    /// Get an article by id, recording one view.
    ///
    /// The returned `views` is the pending count since the last reconcile
    /// when the counter is reachable, otherwise the cached or stored value.
    pub async fn get_by_id(&self, id: i64) -> Result<Article> {
        let cached = match self.cache.get(id).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(article_id = id, error = %e, "Cache read failed, using repository");
                None
            }
        };

        let (mut article, needs_cache) = match cached {
            Some(article) => (article, false),
            None => {
                let mut article = self.articles.get_by_id(id).await?;
                article.author = self.authors.get_by_id(article.author.id).await?;
                (article, true)
            }
        };

        let pending = match self.counters.increment(id).await {
            Ok(total) => {
                article.views = total;
                Some(total)
            }
            Err(e) => {
                warn!(article_id = id, error = %e, "View increment failed");
                None
            }
        };

        let flush_views = pending.filter(|total| self.is_flush_point(*total));
        let snapshot = needs_cache.then(|| article.clone());
        if flush_views.is_some() || snapshot.is_some() {
            self.spawn_side_effects(id, flush_views, snapshot);
        }

        Ok(article)
    }

    fn is_flush_point(&self, total: i64) -> bool {
        let threshold = self.config.view_flush_threshold;
        threshold > 0 && total > 0 && total % threshold == 0
    }

    /// Best-effort follow-up work for a read. Runs on the service's tracker,
    /// so it outlives the request that triggered it.
    fn spawn_side_effects(&self, id: i64, flush_views: Option<i64>, snapshot: Option<Article>) {
        let articles = Arc::clone(&self.articles);
        let cache = Arc::clone(&self.cache);

        self.background.spawn(async move {
            if let Some(views) = flush_views {
                match articles.set_views(id, views).await {
                    Ok(()) => debug!(article_id = id, views = views, "Durable views set at threshold"),
                    Err(e) => warn!(article_id = id, views = views, error = %e, "Threshold view write failed"),
                }
            }

            if let Some(article) = snapshot {
                if let Err(e) = cache.set(&article).await {
                    warn!(article_id = id, error = %e, "Cache fill failed");
                }
            }
        });
    }

    /// Wait until every detached task spawned so far has finished.
    ///
    /// Concurrent callers take turns: the tracker is closed for exactly one
    /// waiter at a time, so a waiter never sees it reopened under it.
    pub async fn wait_background(&self) {
        let _turn = self.background_waiters.lock().await;
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    /// Number of detached tasks still running
    pub fn background_tasks(&self) -> usize {
        self.background.len()
    }

    /// Page of articles with author details.
    ///
    /// `num` is clamped to `[10, 100]`. Authors are looked up concurrently,
    /// once per distinct id; any lookup failure fails the whole page.
    pub async fn fetch(&self, cursor: &str, num: i64) -> Result<(Vec<Article>, String)> {
        let num = clamp_page_size(num);
        let (mut page, next) = self.articles.fetch(cursor, num).await?;

        let author_ids: HashSet<i64> = page.iter().map(|a| a.author.id).collect();
        let authors = try_join_all(author_ids.into_iter().map(|id| self.authors.get_by_id(id))).await?;
        let by_id: HashMap<i64, Author> = authors.into_iter().map(|a| (a.id, a)).collect();

        for article in &mut page {
            if let Some(author) = by_id.get(&article.author.id) {
                article.author = author.clone();
            }
        }

        Ok((page, next))
    }

    /// Insert a new article. Titles are unique and the author must exist.
    pub async fn store(&self, article: &mut Article) -> Result<()> {
        self.ensure_title_free(&article.title, None).await?;
        let author = self.authors.get_by_id(article.author.id).await?;

        let now = Utc::now();
        article.created_at = now;
        article.updated_at = now;
        self.articles.store(article).await?;
        article.author = author;

        info!(article_id = article.id, "Article stored");
        Ok(())
    }

    /// Replace an article's content and drop its cached snapshot.
    ///
    /// On success `article` is refreshed from the repository, so it carries
    /// the stored creation time and durable view count.
    pub async fn update(&self, article: &mut Article) -> Result<()> {
        self.ensure_title_free(&article.title, Some(article.id)).await?;
        let author = self.authors.get_by_id(article.author.id).await?;

        article.updated_at = Utc::now();
        self.articles.update(article).await?;
        self.invalidate(article.id).await;

        *article = self.articles.get_by_id(article.id).await?;
        article.author = author;
        Ok(())
    }

    /// Delete an article and drop its cached snapshot
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.articles.get_by_id(id).await?;
        self.articles.delete(id).await?;
        self.invalidate(id).await;
        info!(article_id = id, "Article deleted");
        Ok(())
    }

    async fn ensure_title_free(&self, title: &str, owner: Option<i64>) -> Result<()> {
        match self.articles.get_by_title(title).await {
            Ok(existing) if Some(existing.id) != owner => Err(LecternError::Conflict(format!(
                "title {:?} already used by article {}",
                title, existing.id
            ))),
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn invalidate(&self, id: i64) {
        if let Err(e) = self.cache.delete(id).await {
            warn!(article_id = id, error = %e, "Cache invalidation failed");
        }
    }
}
