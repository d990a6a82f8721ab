//! Configuration for Lectern
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::services::ReadConfig;
use crate::types::{LecternError, Result};
use crate::worker::SyncConfig;

/// Lectern - article service with buffered view counting
#[derive(Parser, Debug, Clone)]
#[command(name = "lectern")]
#[command(about = "Article service with cache-aside reads and write-behind view counts")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:9090")]
    pub listen: SocketAddr,

    /// MongoDB connection URI (required unless in dev mode)
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "lectern")]
    pub mongodb_db: String,

    /// Redis URL for the snapshot cache and view buffer
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379/0")]
    pub redis_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Enable development mode (in-process cache and in-memory storage)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Article snapshot TTL in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value = "600")]
    pub cache_ttl_secs: u64,

    /// Seconds between view buffer reconciliation passes
    #[arg(long, env = "SYNC_INTERVAL_SECS", default_value = "60")]
    pub sync_interval_secs: u64,

    /// Pending view count multiple at which durable views are set directly
    #[arg(long, env = "VIEW_FLUSH_THRESHOLD", default_value = "10")]
    pub view_flush_threshold: i64,

    /// Wait before restarting a crashed sync loop, in milliseconds
    #[arg(long, env = "SUPERVISOR_BACKOFF_MS", default_value = "1000")]
    pub supervisor_backoff_ms: u64,

    /// Request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.dev_mode && self.mongodb_uri.is_none() {
            return Err(LecternError::Config("MONGODB_URI is required in production mode".into()));
        }

        if self.cache_ttl_secs == 0 {
            return Err(LecternError::Config("CACHE_TTL_SECS must be greater than zero".into()));
        }

        if self.sync_interval_secs == 0 {
            return Err(LecternError::Config("SYNC_INTERVAL_SECS must be greater than zero".into()));
        }

        if self.view_flush_threshold <= 0 {
            return Err(LecternError::Config("VIEW_FLUSH_THRESHOLD must be greater than zero".into()));
        }

        if self.request_timeout_ms == 0 {
            return Err(LecternError::Config("REQUEST_TIMEOUT_MS must be greater than zero".into()));
        }

        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            article_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            interval: Duration::from_secs(self.sync_interval_secs),
            restart_backoff: Duration::from_millis(self.supervisor_backoff_ms),
        }
    }

    pub fn read_config(&self) -> ReadConfig {
        ReadConfig {
            view_flush_threshold: self.view_flush_threshold,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
