use crate::server::SharedState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Json};
use frame_pipeline::WorkerState;
use serde::Serialize;

#[derive(Serialize)]
pub struct Status {
    status: String,
    worker: String,
}

pub async fn healthcheck(State(state): State<SharedState>) -> impl IntoResponse {
    let worker = state.pipeline_status.worker_state();
    let (code, status) = match worker {
        WorkerState::Stopped => (StatusCode::SERVICE_UNAVAILABLE, "Unavailable"),
        _ => (StatusCode::OK, "Available"),
    };

    (
        code,
        Json(Status {
            status: status.into(),
            worker: worker.to_string(),
        }),
    )
}
