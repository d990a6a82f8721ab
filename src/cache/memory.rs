//! In-process cache backend
//!
//! Implements the [`CacheBackend`] primitives over a single map guarded by a
//! mutex, so each primitive is atomic the same way a Redis command is. The
//! lock is only held inside the synchronous body of a call, never across an
//! await. Used in dev mode and by tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::backend::{CacheBackend, CacheBackendError};

enum Value {
    Bytes {
        data: Vec<u8>,
        expires_at: Option<Instant>,
    },
    Hash(HashMap<String, i64>),
}

impl Value {
    fn is_expired(&self, now: Instant) -> bool {
        match self {
            Value::Bytes {
                expires_at: Some(at),
                ..
            } => now >= *at,
            _ => false,
        }
    }
}

fn wrong_type(key: &str) -> CacheBackendError {
    CacheBackendError::Command(format!(
        "WRONGTYPE operation against key '{}' holding the wrong kind of value",
        key
    ))
}

/// In-memory [`CacheBackend`]
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|entries| entries.values().filter(|v| !v.is_expired(now)).count())
            .unwrap_or(0)
    }

    /// Whether the backend holds no live keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>, CacheBackendError> {
        self.entries
            .lock()
            .map_err(|_| CacheBackendError::Unavailable("memory backend lock poisoned".into()))
    }

    /// Drop `key` if it has expired, so the caller sees it as absent.
    fn purge_expired(entries: &mut HashMap<String, Value>, key: &str) {
        let now = Instant::now();
        if entries.get(key).is_some_and(|v| v.is_expired(now)) {
            entries.remove(key);
            debug!(key = key, "Expired key removed");
        }
    }
}

#[async_trait::async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheBackendError> {
        let mut entries = self.lock()?;
        Self::purge_expired(&mut entries, key);
        match entries.get(key) {
            None => Ok(None),
            Some(Value::Bytes { data, .. }) => Ok(Some(data.clone())),
            Some(Value::Hash(_)) => Err(wrong_type(key)),
        }
    }

    async fn set_ex(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheBackendError> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Value::Bytes {
                data: value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, CacheBackendError> {
        let mut entries = self.lock()?;
        Self::purge_expired(&mut entries, key);
        Ok(entries.remove(key).is_some())
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, CacheBackendError> {
        let mut entries = self.lock()?;
        Self::purge_expired(&mut entries, key);
        let value = entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()));
        match value {
            Value::Hash(fields) => {
                let counter = fields.entry(field.to_string()).or_insert(0);
                *counter = counter.checked_add(delta).ok_or_else(|| {
                    CacheBackendError::Command("increment or decrement would overflow".into())
                })?;
                Ok(*counter)
            }
            Value::Bytes { .. } => Err(wrong_type(key)),
        }
    }

    async fn rename(&self, key: &str, new_key: &str) -> Result<bool, CacheBackendError> {
        let mut entries = self.lock()?;
        Self::purge_expired(&mut entries, key);
        match entries.remove(key) {
            Some(value) => {
                entries.insert(new_key.to_string(), value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheBackendError> {
        let mut entries = self.lock()?;
        Self::purge_expired(&mut entries, key);
        match entries.get(key) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(fields)) => Ok(fields
                .iter()
                .map(|(field, count)| (field.clone(), count.to_string()))
                .collect()),
            Some(Value::Bytes { .. }) => Err(wrong_type(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_del() {
        let backend = MemoryBackend::new();
        assert!(backend.get("k").await.unwrap().is_none());

        backend
            .set_ex("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v".to_vec()));

        assert!(backend.del("k").await.unwrap());
        assert!(!backend.del("k").await.unwrap());
        assert!(backend.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ex_expires() {
        let backend = MemoryBackend::new();
        backend
            .set_ex("k", b"v".to_vec(), Duration::from_secs(600))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(backend.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(backend.get("k").await.unwrap().is_none());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_hincr_by_accumulates_per_field() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.hincr_by("h", "1", 1).await.unwrap(), 1);
        assert_eq!(backend.hincr_by("h", "1", 1).await.unwrap(), 2);
        assert_eq!(backend.hincr_by("h", "2", 5).await.unwrap(), 5);

        let all = backend.hgetall("h").await.unwrap();
        assert_eq!(all.get("1").map(String::as_str), Some("2"));
        assert_eq!(all.get("2").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn test_rename_moves_and_reports_absence() {
        let backend = MemoryBackend::new();
        assert!(!backend.rename("a", "b").await.unwrap());

        backend.hincr_by("a", "x", 3).await.unwrap();
        backend.hincr_by("b", "stale", 9).await.unwrap();
        assert!(backend.rename("a", "b").await.unwrap());

        assert!(backend.hgetall("a").await.unwrap().is_empty());
        let moved = backend.hgetall("b").await.unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved.get("x").map(String::as_str), Some("3"));
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let backend = MemoryBackend::new();
        backend
            .set_ex("s", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        backend.hincr_by("h", "f", 1).await.unwrap();

        assert!(backend.hincr_by("s", "f", 1).await.is_err());
        assert!(backend.get("h").await.is_err());
        assert!(backend.hgetall("s").await.is_err());
    }
}
