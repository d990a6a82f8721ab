//! Lectern - article service with buffered view counting
//!
//! Serves articles through a cache-aside read path. Every read records a
//! view in a write-behind counter buffer, which a background worker drains
//! into durable storage on an interval and once more at shutdown.
//!
//! Snapshots and counters share one cache backend (Redis in production);
//! articles and authors live in MongoDB.

pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
pub mod worker;

pub use config::Args;
pub use server::{run, AppState};
pub use services::ArticleService;
pub use types::{LecternError, Result};
pub use worker::SyncWorker;
