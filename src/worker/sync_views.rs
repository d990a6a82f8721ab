//! View count reconciliation worker
//!
//! Drains the [`CounterBuffer`] on a fixed interval and adds each pending
//! count to the durable view count. Cancelling the worker triggers one last
//! drain before it stops.
//!
//! ## Structure
//!
//! ```text
//! supervisor ──spawn──▶ reconcile loop ──tick──▶ run_once
//!     ▲                      │
//!     └── panic: log, back off, restart
//! ```
//!
//! A per-article apply failure is logged and that article's delta is
//! dropped for the cycle. Only a panic inside the loop reaches the
//! supervisor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::CounterBuffer;
use crate::db::ArticleRepository;

// ============================================================================
// Configuration
// ============================================================================

/// Default time between reconciliation passes
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Default wait before restarting a crashed reconcile loop
pub const DEFAULT_RESTART_BACKOFF: Duration = Duration::from_secs(1);

/// Sync worker configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between reconciliation passes
    pub interval: Duration,
    /// Wait before restarting the loop after a panic
    pub restart_backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            restart_backoff: DEFAULT_RESTART_BACKOFF,
        }
    }
}

// ============================================================================
// State and reporting
// ============================================================================

/// Worker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, not yet spawned
    Idle,
    /// Reconciling on the interval
    Running,
    /// Final flush done, no more passes
    Stopped,
}

/// Outcome of one drain and apply pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Articles present in the drained buffer
    pub drained: usize,
    /// Articles whose delta was added to the durable count
    pub applied: usize,
    /// Articles whose delta was dropped
    pub failed: usize,
    /// Total views added to durable storage
    pub views_applied: i64,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.drained == 0
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Background reconciler for buffered view counts
pub struct SyncWorker {
    articles: Arc<dyn ArticleRepository>,
    counters: Arc<CounterBuffer>,
    config: SyncConfig,
    state: watch::Sender<WorkerState>,
    passes: AtomicU64,
    restarts: AtomicU64,
}

impl SyncWorker {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        counters: Arc<CounterBuffer>,
        config: SyncConfig,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            articles,
            counters,
            config,
            state,
            passes: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Completed drain and apply passes
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Times the reconcile loop was restarted after a panic
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Drain the buffer once and add every pending count to durable storage
    pub async fn run_once(&self) -> SyncReport {
        let pending = match self.counters.drain_and_reset().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "View buffer drain failed, skipping cycle");
                self.passes.fetch_add(1, Ordering::Relaxed);
                return SyncReport::default();
            }
        };

        let mut report = SyncReport {
            drained: pending.len(),
            ..Default::default()
        };

        for (id, delta) in pending {
            match self.articles.add_views(id, delta).await {
                Ok(()) => {
                    report.applied += 1;
                    report.views_applied += delta;
                    debug!(article_id = id, delta = delta, "Views applied");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(article_id = id, lost_views = delta, error = %e, "Failed to apply views, dropping delta");
                }
            }
        }

        self.passes.fetch_add(1, Ordering::Relaxed);
        if !report.is_empty() {
            info!(
                drained = report.drained,
                applied = report.applied,
                failed = report.failed,
                views = report.views_applied,
                "View counts reconciled"
            );
        }
        report
    }

    /// Start the supervised reconcile loop.
    ///
    /// The handle resolves after `cancel` fires and the final flush is done.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting view sync worker"
        );
        self.state.send_replace(WorkerState::Running);
        tokio::spawn(self.supervise(cancel))
    }

    async fn supervise(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let inner = tokio::spawn(Arc::clone(&self).reconcile_loop(cancel.clone()));
            match inner.await {
                Ok(()) => break,
                Err(e) if e.is_panic() => {
                    self.restarts.fetch_add(1, Ordering::Relaxed);
                    error!(
                        backoff_ms = self.config.restart_backoff.as_millis() as u64,
                        "View sync loop panicked, restarting"
                    );
                    // Cancelled during backoff: restart anyway so the loop
                    // runs its final flush.
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(self.config.restart_backoff) => {}
                    }
                }
                Err(e) => {
                    error!(error = %e, "View sync loop aborted");
                    break;
                }
            }
        }

        self.state.send_replace(WorkerState::Stopped);
        info!("View sync worker stopped");
    }

    async fn reconcile_loop(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("View sync worker shutting down, flushing buffer");
                    self.run_once().await;
                    return;
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use crate::db::InMemoryArticleRepository;
    use crate::domain::Article;

    async fn setup() -> (Arc<InMemoryArticleRepository>, Arc<CounterBuffer>, i64) {
        let articles = Arc::new(InMemoryArticleRepository::new());
        let mut article = Article::new("Synced", "body", 1);
        articles.store(&mut article).await.unwrap();
        let counters = Arc::new(CounterBuffer::new(Arc::new(MemoryBackend::new())));
        (articles, counters, article.id)
    }

    #[tokio::test]
    async fn test_run_once_adds_deltas() {
        let (articles, counters, id) = setup().await;
        articles.set_views(id, 5).await.unwrap();
        for _ in 0..3 {
            counters.increment(id).await.unwrap();
        }

        let worker = SyncWorker::new(articles.clone(), counters, SyncConfig::default());
        let report = worker.run_once().await;

        assert_eq!(report.applied, 1);
        assert_eq!(report.views_applied, 3);
        assert_eq!(articles.views(id).await, Some(8));
        assert!(worker.run_once().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_article_is_dropped() {
        let (articles, counters, id) = setup().await;
        counters.increment(id).await.unwrap();
        counters.increment(404).await.unwrap();

        let worker = SyncWorker::new(articles.clone(), counters, SyncConfig::default());
        let report = worker.run_once().await;

        assert_eq!(report.drained, 2);
        assert_eq!(report.applied, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(articles.views(id).await, Some(1));
        assert!(worker.run_once().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_interval() {
        let (articles, counters, id) = setup().await;
        let worker = Arc::new(SyncWorker::new(
            articles.clone(),
            counters.clone(),
            SyncConfig::default(),
        ));
        assert_eq!(worker.state(), WorkerState::Idle);

        let cancel = CancellationToken::new();
        let handle = Arc::clone(&worker).spawn(cancel.clone());
        assert_eq!(worker.state(), WorkerState::Running);

        counters.increment(id).await.unwrap();
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(worker.passes(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(worker.passes(), 1);
        assert_eq!(articles.views(id).await, Some(1));

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(worker.passes(), 2);
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick_flushes_once() {
        let (articles, counters, id) = setup().await;
        for _ in 0..4 {
            counters.increment(id).await.unwrap();
        }

        let worker = Arc::new(SyncWorker::new(
            articles.clone(),
            counters,
            SyncConfig::default(),
        ));
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&worker).spawn(cancel.clone());

        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(worker.passes(), 1);
        assert_eq!(articles.views(id).await, Some(4));
        assert_eq!(worker.state(), WorkerState::Stopped);
    }
}
