use crate::{
    config::{Config, DisplayConfig},
    routes::api_routes,
    stream::{AnnotatedFrames, VideoStream},
    telemetry::Metrics,
};
use axum::Router;
use axum_otel_metrics::HttpMetricsLayerBuilder;
use frame_pipeline::{PipelineStatus, ResultReader};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

#[derive(Clone)]
pub struct SharedState {
    pub results: ResultReader,
    pub pipeline_status: PipelineStatus,
    pub video_stream: VideoStream,
    pub metrics: Arc<Metrics>,
}

impl SharedState {
    pub fn new(
        results: ResultReader,
        pipeline_status: PipelineStatus,
        frames: AnnotatedFrames,
        display: &DisplayConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            results,
            pipeline_status,
            video_stream: VideoStream::new(frames, display.get_stream_delay_ms()),
            metrics,
        }
    }
}

pub fn build_router(state: SharedState) -> Router {
    let metrics_layer = HttpMetricsLayerBuilder::new().build();

    Router::new()
        .merge(api_routes())
        .with_state(state)
        .layer(metrics_layer)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(state: SharedState, config: &Config) -> anyhow::Result<Self> {
        let addr = config.server.get_address();
        let router = build_router(state);
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub fn run(self, mut shutdown_rx: Receiver<()>) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            Ok(())
        });

        Ok(server_handle)
    }
}
