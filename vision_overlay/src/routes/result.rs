use crate::server::SharedState;
use axum::{extract::State, response::Json};
use frame_pipeline::ResultView;
use serde::Serialize;

#[derive(Serialize)]
pub struct CurrentResult {
    #[serde(flatten)]
    result: ResultView,
    worker_state: String,
    frames_accepted: u64,
    frames_dropped: u64,
}

pub async fn current_result(State(state): State<SharedState>) -> Json<CurrentResult> {
    state.metrics.record_request("/result");

    let snapshot = state.results.current_result();
    let stats = state.pipeline_status.slot_stats();

    Json(CurrentResult {
        result: snapshot.to_view(),
        worker_state: state.pipeline_status.worker_state().to_string(),
        frames_accepted: stats.accepted,
        frames_dropped: stats.dropped,
    })
}
