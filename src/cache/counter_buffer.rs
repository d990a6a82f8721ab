//! Write-behind view counter buffer
//!
//! Pending views live in one hash (`article:views:buffer`, field = article
//! id). Readers bump a field with a single `HINCRBY`. A drain hands the whole
//! hash off with one `RENAME` to `article:views:processing`, so new
//! increments immediately start a fresh buffer, then reads and deletes the
//! renamed copy.
//!
//! An increment that completes before the rename is in that drain's result;
//! one that completes after goes to the next buffer. Increments take no
//! in-process lock: the partition rests on the backend's atomic primitives.
//!
//! A drain that renamed the buffer but could not read it leaves the copy
//! under the processing key and flags it; the next drain reads that copy
//! before renaming over it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::backend::{CacheBackend, CacheBackendError};
use super::keys::CacheKey;

/// Atomic per-article pending view counters.
///
/// Increments may come from any number of tasks; drains are expected from a
/// single reconciler at a time.
pub struct CounterBuffer {
    backend: Arc<dyn CacheBackend>,
    /// A drain renamed the buffer but never read it back
    needs_recovery: AtomicBool,
    /// Counts read from an unfinished drain, returned by the next one
    carried: Mutex<HashMap<i64, i64>>,
}

impl CounterBuffer {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            needs_recovery: AtomicBool::new(false),
            carried: Mutex::new(HashMap::new()),
        }
    }

    /// Record one view, returning the pending total since the last drain
    pub async fn increment(&self, id: i64) -> Result<i64, CacheBackendError> {
        self.backend
            .hincr_by(&CacheKey::ViewsBuffer.to_storage_key(), &id.to_string(), 1)
            .await
    }

    /// Take every pending counter and start a fresh buffer.
    ///
    /// Returns an empty map when nothing was recorded since the last drain.
    /// If an earlier drain renamed the buffer but failed to read it, that
    /// copy is read first and merged into this result. A processing copy
    /// whose delete failed after a successful read is overwritten by the
    /// next rename, never applied twice.
    pub async fn drain_and_reset(&self) -> Result<HashMap<i64, i64>, CacheBackendError> {
        let active = CacheKey::ViewsBuffer.to_storage_key();
        let processing = CacheKey::ViewsProcessing.to_storage_key();

        if self.needs_recovery.load(Ordering::Acquire) {
            let leftover = parse_counts(self.backend.hgetall(&processing).await?);
            warn!(articles = leftover.len(), "Recovered unread view buffer");
            self.carry(leftover)?;
            self.needs_recovery.store(false, Ordering::Release);
        }

        if !self.backend.rename(&active, &processing).await? {
            let pending = self.take_carried()?;
            if !pending.is_empty() {
                self.delete_processing(&processing).await;
            }
            debug!(articles = pending.len(), "View buffer empty, returning recovered counts");
            return Ok(pending);
        }

        let raw = match self.backend.hgetall(&processing).await {
            Ok(raw) => raw,
            Err(e) => {
                self.needs_recovery.store(true, Ordering::Release);
                return Err(e);
            }
        };

        let mut pending = self.take_carried()?;
        for (id, count) in parse_counts(raw) {
            *pending.entry(id).or_insert(0) += count;
        }

        self.delete_processing(&processing).await;

        debug!(articles = pending.len(), "View buffer drained");
        Ok(pending)
    }

    // The snapshot is already in hand; a leftover copy is overwritten by the
    // next rename, so a failed delete only costs memory.
    async fn delete_processing(&self, processing: &str) {
        if let Err(e) = self.backend.del(processing).await {
            warn!(error = %e, "Failed to delete drained view buffer");
        }
    }

    fn carry(&self, counts: HashMap<i64, i64>) -> Result<(), CacheBackendError> {
        let mut carried = self.lock_carried()?;
        for (id, count) in counts {
            *carried.entry(id).or_insert(0) += count;
        }
        Ok(())
    }

    fn take_carried(&self) -> Result<HashMap<i64, i64>, CacheBackendError> {
        Ok(std::mem::take(&mut *self.lock_carried()?))
    }

    fn lock_carried(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<i64, i64>>, CacheBackendError> {
        self.carried
            .lock()
            .map_err(|_| CacheBackendError::Unavailable("view carry lock poisoned".into()))
    }
}

fn parse_counts(raw: HashMap<String, String>) -> HashMap<i64, i64> {
    let mut counts = HashMap::with_capacity(raw.len());
    for (field, value) in raw {
        match (field.parse::<i64>(), value.parse::<i64>()) {
            (Ok(id), Ok(count)) => {
                counts.insert(id, count);
            }
            _ => warn!(field = field, value = value, "Skipping malformed view buffer entry"),
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use std::time::Duration;

    /// Memory backend whose next `hgetall` calls fail
    #[derive(Default)]
    struct ReadFailures {
        inner: MemoryBackend,
        remaining: std::sync::atomic::AtomicUsize,
    }

    impl ReadFailures {
        fn fail_next(&self, n: usize) {
            self.remaining.store(n, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl CacheBackend for ReadFailures {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheBackendError> {
            self.inner.get(key).await
        }

        async fn set_ex(
            &self,
            key: &str,
            value: Vec<u8>,
            ttl: Duration,
        ) -> Result<(), CacheBackendError> {
            self.inner.set_ex(key, value, ttl).await
        }

        async fn del(&self, key: &str) -> Result<bool, CacheBackendError> {
            self.inner.del(key).await
        }

        async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, CacheBackendError> {
            self.inner.hincr_by(key, field, delta).await
        }

        async fn rename(&self, key: &str, new_key: &str) -> Result<bool, CacheBackendError> {
            self.inner.rename(key, new_key).await
        }

        async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheBackendError> {
            let failing = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(CacheBackendError::Unavailable("blip".into()));
            }
            self.inner.hgetall(key).await
        }
    }

    #[tokio::test]
    async fn test_failed_read_is_recovered_by_next_drain() {
        let backend = Arc::new(ReadFailures::default());
        let buffer = CounterBuffer::new(backend.clone());
        for _ in 0..5 {
            buffer.increment(1).await.unwrap();
        }

        backend.fail_next(1);
        assert!(buffer.drain_and_reset().await.is_err());

        buffer.increment(1).await.unwrap();
        assert_eq!(buffer.drain_and_reset().await.unwrap(), HashMap::from([(1, 6)]));
        assert!(buffer.drain_and_reset().await.unwrap().is_empty());
        assert!(backend.inner.is_empty());
    }

    #[tokio::test]
    async fn test_recovery_without_new_increments() {
        let backend = Arc::new(ReadFailures::default());
        let buffer = CounterBuffer::new(backend.clone());
        buffer.increment(2).await.unwrap();
        buffer.increment(3).await.unwrap();

        backend.fail_next(1);
        assert!(buffer.drain_and_reset().await.is_err());

        assert_eq!(
            buffer.drain_and_reset().await.unwrap(),
            HashMap::from([(2, 1), (3, 1)])
        );
        assert!(buffer.drain_and_reset().await.unwrap().is_empty());
        assert!(backend.inner.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_read_failures_lose_nothing() {
        let backend = Arc::new(ReadFailures::default());
        let buffer = CounterBuffer::new(backend.clone());
        buffer.increment(1).await.unwrap();

        // Drain fails, then the recovery read itself fails
        backend.fail_next(2);
        assert!(buffer.drain_and_reset().await.is_err());
        buffer.increment(1).await.unwrap();
        assert!(buffer.drain_and_reset().await.is_err());

        buffer.increment(1).await.unwrap();
        assert_eq!(buffer.drain_and_reset().await.unwrap(), HashMap::from([(1, 3)]));
        assert!(buffer.drain_and_reset().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_increment_returns_running_total() {
        let buffer = CounterBuffer::new(Arc::new(MemoryBackend::new()));
        for expected in 1..=10 {
            assert_eq!(buffer.increment(1).await.unwrap(), expected);
        }
        assert_eq!(buffer.increment(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_drain_untouched_buffer_is_empty() {
        let buffer = CounterBuffer::new(Arc::new(MemoryBackend::new()));
        assert!(buffer.drain_and_reset().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drain_returns_snapshot_then_resets() {
        let backend = Arc::new(MemoryBackend::new());
        let buffer = CounterBuffer::new(backend.clone());
        for _ in 0..3 {
            buffer.increment(1).await.unwrap();
        }
        for _ in 0..5 {
            buffer.increment(2).await.unwrap();
        }

        let drained = buffer.drain_and_reset().await.unwrap();
        assert_eq!(drained, HashMap::from([(1, 3), (2, 5)]));
        assert!(buffer.drain_and_reset().await.unwrap().is_empty());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_increment_after_drain_starts_from_one() {
        let buffer = CounterBuffer::new(Arc::new(MemoryBackend::new()));
        buffer.increment(1).await.unwrap();
        buffer.increment(1).await.unwrap();
        buffer.drain_and_reset().await.unwrap();

        assert_eq!(buffer.increment(1).await.unwrap(), 1);
        assert_eq!(buffer.drain_and_reset().await.unwrap(), HashMap::from([(1, 1)]));
    }

    #[tokio::test]
    async fn test_malformed_fields_are_skipped() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .hincr_by(&CacheKey::ViewsBuffer.to_storage_key(), "not-an-id", 4)
            .await
            .unwrap();
        let buffer = CounterBuffer::new(backend);
        buffer.increment(8).await.unwrap();

        assert_eq!(buffer.drain_and_reset().await.unwrap(), HashMap::from([(8, 1)]));
    }
}
