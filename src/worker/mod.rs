//! Background workers

pub mod sync_views;

pub use sync_views::{SyncConfig, SyncReport, SyncWorker, WorkerState};
