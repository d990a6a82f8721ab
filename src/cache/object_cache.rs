//! Read-through article snapshot cache
//!
//! Stores a full JSON snapshot of an [`Article`] under `article:{id}` with a
//! fixed expiry. A miss (`Ok(None)`) and a backend failure (`Err`) are kept
//! distinct: callers must not treat an unreachable cache as "absent".
//! No retries here; the caller decides what a failure means.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::backend::{CacheBackend, CacheBackendError};
use super::keys::CacheKey;
use super::CacheConfig;
use crate::domain::Article;

/// Article snapshot cache over a [`CacheBackend`]
pub struct ObjectCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ObjectCache {
    /// Create a cache with the configured snapshot TTL
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            ttl: config.article_ttl,
        }
    }

    /// Look up a cached article.
    ///
    /// An entry that no longer decodes is reported as a value error, so the
    /// caller falls back to the repository and repopulates it.
    pub async fn get(&self, id: i64) -> Result<Option<Article>, CacheBackendError> {
        let key = CacheKey::Article(id).to_storage_key();
        let Some(data) = self.backend.get(&key).await? else {
            debug!(key = key, "Cache miss");
            return Ok(None);
        };

        let article = serde_json::from_slice(&data)
            .map_err(|e| CacheBackendError::Value(format!("undecodable snapshot {}: {}", key, e)))?;
        debug!(key = key, "Cache hit");
        Ok(Some(article))
    }

    /// Store a snapshot, overwriting any existing entry for the same id
    pub async fn set(&self, article: &Article) -> Result<(), CacheBackendError> {
        let key = CacheKey::Article(article.id).to_storage_key();
        let data = serde_json::to_vec(article)
            .map_err(|e| CacheBackendError::Value(format!("unencodable article {}: {}", article.id, e)))?;
        self.backend.set_ex(&key, data, self.ttl).await?;
        debug!(key = key, ttl_secs = self.ttl.as_secs(), "Cache set");
        Ok(())
    }

    /// Remove the snapshot and any legacy per-article keys. Absent keys are fine.
    pub async fn delete(&self, id: i64) -> Result<(), CacheBackendError> {
        for key in CacheKey::invalidation_keys(id) {
            self.backend.del(&key.to_storage_key()).await?;
        }
        debug!(article_id = id, "Cache invalidated");
        Ok(())
    }
}
