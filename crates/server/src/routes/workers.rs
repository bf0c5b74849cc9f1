use axum::extract::State;
use axum::Json;
use serde::Serialize;
use storyloom_core::WorkerEntry;

use crate::state::AppState;

#[derive(Serialize)]
pub struct WorkersResponse {
    pub workers: Vec<WorkerEntry>,
}

/// Snapshot of every registered worker, in id order.
pub async fn list_workers(State(state): State<AppState>) -> Json<WorkersResponse> {
    Json(WorkersResponse {
        workers: state.registry.all(),
    })
}
