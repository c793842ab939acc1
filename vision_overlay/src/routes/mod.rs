mod health;
mod metrics;
mod result;
mod video_feed;

use crate::server::SharedState;
use axum::{routing::get, Router};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/result", get(result::current_result))
        .route("/video_feed", get(video_feed::video_feed))
}
