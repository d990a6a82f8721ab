//! Redis cache backend
//!
//! Uses a multiplexed [`ConnectionManager`], cloned per command, which
//! reconnects on its own after a dropped connection.

use std::collections::HashMap;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tracing::info;

use super::backend::{CacheBackend, CacheBackendError};

impl From<RedisError> for CacheBackendError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Command(err.to_string())
        }
    }
}

/// `RENAME` on a missing source key fails with `ERR no such key`.
fn is_no_such_key(err: &RedisError) -> bool {
    err.to_string().to_ascii_lowercase().contains("no such key")
}

/// Redis-backed [`CacheBackend`]
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connect and verify with `PING`
    pub async fn connect(url: &str) -> Result<Self, CacheBackendError> {
        info!("Connecting to Redis at {}", url);

        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(reply = pong, "Connected to Redis");

        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheBackendError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheBackendError> {
        let mut conn = self.conn.clone();
        // EX takes whole seconds and rejects zero
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, CacheBackendError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, CacheBackendError> {
        let mut conn = self.conn.clone();
        Ok(conn.hincr(key, field, delta).await?)
    }

    async fn rename(&self, key: &str, new_key: &str) -> Result<bool, CacheBackendError> {
        let mut conn = self.conn.clone();
        match conn.rename::<_, _, ()>(key, new_key).await {
            Ok(()) => Ok(true),
            Err(e) if is_no_such_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheBackendError> {
        let mut conn = self.conn.clone();
        Ok(conn.hgetall(key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ErrorKind;

    // Integration tests would require a running Redis instance

    #[test]
    fn test_no_such_key_detection() {
        let err = RedisError::from((ErrorKind::ResponseError, "An error was signalled by the server", "no such key".to_string()));
        assert!(is_no_such_key(&err));

        let other = RedisError::from((ErrorKind::ResponseError, "An error was signalled by the server", "WRONGTYPE".to_string()));
        assert!(!is_no_such_key(&other));
    }

    #[test]
    fn test_response_error_maps_to_command() {
        let err = RedisError::from((ErrorKind::ResponseError, "An error was signalled by the server", "READONLY".to_string()));
        assert!(matches!(CacheBackendError::from(err), CacheBackendError::Command(_)));
    }
}
