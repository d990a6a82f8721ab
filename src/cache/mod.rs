//! Caching layer for Lectern
//!
//! Two components share one cache backend:
//!
//! - [`ObjectCache`] - read-through article snapshots with a fixed TTL
//! - [`CounterBuffer`] - write-behind per-article view counters, drained
//!   periodically by the [`SyncWorker`](crate::worker::SyncWorker)
//!
//! ## Backends
//!
//! Anything implementing [`CacheBackend`] can be injected:
//! - [`RedisBackend`] for production
//! - [`MemoryBackend`] for dev mode and tests
//!
//! ## Key Layout
//!
//! ```text
//! article:{id}               snapshot (JSON, 10 min TTL)
//! article:views:{id}         legacy per-article counter (delete only)
//! article:views:buffer       active view buffer (hash id -> pending)
//! article:views:processing   buffer being drained
//! ```

pub mod backend;
pub mod counter_buffer;
pub mod keys;
pub mod memory;
pub mod object_cache;
pub mod redis_backend;

pub use backend::{CacheBackend, CacheBackendError};
pub use counter_buffer::CounterBuffer;
pub use keys::{CacheKey, VIEWS_BUFFER_KEY, VIEWS_PROCESSING_KEY};
pub use memory::MemoryBackend;
pub use object_cache::ObjectCache;
pub use redis_backend::RedisBackend;

use std::time::Duration;

/// Default article snapshot TTL
pub const DEFAULT_ARTICLE_TTL: Duration = Duration::from_secs(10 * 60);

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for article snapshots
    pub article_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            article_ttl: DEFAULT_ARTICLE_TTL,
        }
    }
}
