//! Cache key definitions
//!
//! Every key Lectern touches in the cache backend goes through [`CacheKey`].

use std::fmt;

/// Well-known key of the active view buffer (hash: article id -> pending views)
pub const VIEWS_BUFFER_KEY: &str = "article:views:buffer";

/// Key the active buffer is renamed to while a drain is in progress
pub const VIEWS_PROCESSING_KEY: &str = "article:views:processing";

/// A key in the cache backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Serialized article snapshot
    Article(i64),
    /// Per-article view counter from the old counting scheme. Never written
    /// any more, only removed on invalidation.
    LegacyViews(i64),
    /// Active view buffer
    ViewsBuffer,
    /// View buffer being drained
    ViewsProcessing,
}

impl CacheKey {
    /// Convert to storage key string
    pub fn to_storage_key(&self) -> String {
        match self {
            Self::Article(id) => format!("article:{}", id),
            Self::LegacyViews(id) => format!("article:views:{}", id),
            Self::ViewsBuffer => VIEWS_BUFFER_KEY.to_string(),
            Self::ViewsProcessing => VIEWS_PROCESSING_KEY.to_string(),
        }
    }

    /// Keys to remove when an article is invalidated
    pub fn invalidation_keys(id: i64) -> [CacheKey; 2] {
        [Self::Article(id), Self::LegacyViews(id)]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys() {
        assert_eq!(CacheKey::Article(42).to_storage_key(), "article:42");
        assert_eq!(CacheKey::LegacyViews(42).to_storage_key(), "article:views:42");
        assert_eq!(CacheKey::ViewsBuffer.to_storage_key(), VIEWS_BUFFER_KEY);
        assert_eq!(CacheKey::ViewsProcessing.to_storage_key(), VIEWS_PROCESSING_KEY);
    }

    #[test]
    fn test_buffer_keys_differ() {
        assert_ne!(
            CacheKey::ViewsBuffer.to_storage_key(),
            CacheKey::ViewsProcessing.to_storage_key()
        );
    }

    #[test]
    fn test_invalidation_covers_snapshot_and_legacy_counter() {
        let keys = CacheKey::invalidation_keys(5);
        assert!(keys.contains(&CacheKey::Article(5)));
        assert!(keys.contains(&CacheKey::LegacyViews(5)));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", CacheKey::Article(1)), "article:1");
    }
}
