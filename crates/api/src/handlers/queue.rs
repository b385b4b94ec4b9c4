//! Queue depth for the autoscaler.

use axum::extract::State;
use axum::Json;
use noise_store::StateCounts;
use serde::Serialize;

use crate::state::AppState;

/// Response for GET /queue.
#[derive(Debug, Serialize)]
pub struct QueueStatus {
    /// Job references waiting for a worker.
    pub depth: usize,
    pub capacity: usize,
    pub workers: usize,
    /// Live jobs per state.
    pub jobs: StateCounts,
}

/// GET /queue
pub async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(QueueStatus {
        depth: state.queue.depth(),
        capacity: state.queue.capacity(),
        workers: state.worker_count,
        jobs: state.registry.state_counts().await,
    })
}
