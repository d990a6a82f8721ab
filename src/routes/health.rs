//! Health check endpoint

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::server::AppState;
use crate::worker::WorkerState;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub mode: &'static str,
    /// View sync worker lifecycle state
    pub sync_worker: &'static str,
    /// Completed reconcile passes
    pub sync_passes: u64,
    /// Reconcile loop restarts after a panic
    pub sync_restarts: u64,
    /// Detached read-path tasks still running
    pub background_tasks: usize,
    pub timestamp: String,
}

fn worker_state_name(state: WorkerState) -> &'static str {
    match state {
        WorkerState::Idle => "idle",
        WorkerState::Running => "running",
        WorkerState::Stopped => "stopped",
    }
}

/// Handle liveness check (/health)
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        sync_worker: worker_state_name(state.worker.state()),
        sync_passes: state.worker.passes(),
        sync_restarts: state.worker.restarts(),
        background_tasks: state.service.background_tasks(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    json_response(StatusCode::OK, &response)
}
