//! Cache backend capability
//!
//! The narrow set of primitives Lectern needs from its cache store. Both
//! [`ObjectCache`](super::ObjectCache) and [`CounterBuffer`](super::CounterBuffer)
//! are built on an injected `Arc<dyn CacheBackend>`; there is no global client.
//!
//! Implementations must make `hincr_by` and `rename` atomic with respect to
//! each other: every increment lands either in the hash before it is renamed
//! or in a fresh hash under the old key, never in both and never in neither.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

/// Failure talking to the cache backend.
///
/// A missing key is never an error: lookups return `Ok(None)` for that.
#[derive(Debug, Error)]
pub enum CacheBackendError {
    /// Backend unreachable (connect, I/O, timeout)
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected the command
    #[error("cache command failed: {0}")]
    Command(String),

    /// Stored value could not be encoded or decoded
    #[error("cache value error: {0}")]
    Value(String),
}

/// Primitives required from the cache store
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// `GET key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheBackendError>;

    /// `SET key value EX ttl`
    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration)
        -> Result<(), CacheBackendError>;

    /// `DEL key`. Returns whether a key was removed.
    async fn del(&self, key: &str) -> Result<bool, CacheBackendError>;

    /// `HINCRBY key field delta`, returning the new field value
    async fn hincr_by(&self, key: &str, field: &str, delta: i64)
        -> Result<i64, CacheBackendError>;

    /// `RENAME key new_key`, overwriting `new_key`.
    ///
    /// Returns `Ok(false)` when `key` does not exist.
    async fn rename(&self, key: &str, new_key: &str) -> Result<bool, CacheBackendError>;

    /// `HGETALL key`. An absent key yields an empty map.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheBackendError>;
}
