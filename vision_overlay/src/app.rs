use crate::capture::CaptureLoop;
use crate::config::Config;
use crate::overlay::OverlayRenderer;
use crate::server::{HttpServer, SharedState};
use crate::source::FrameSource;
use crate::stream::AnnotatedFrames;
use crate::telemetry::Metrics;
use frame_pipeline::{OllamaClient, Pipeline};

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let source = match FrameSource::open(&config.source) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("Failed to open frame source: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let metrics = Arc::new(Metrics::new()?);

    let client = OllamaClient::new(&config.inference.get_address(), &config.inference.model)?;
    tracing::info!(
        "Sending frames to {} with model {}",
        client.url(),
        client.model()
    );

    let pipeline = match Pipeline::start_with_observer(
        client,
        &config.pipeline_config(),
        metrics.clone(),
    ) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("Failed to start frame pipeline: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let frames = AnnotatedFrames::new();
    let state = SharedState::new(
        pipeline.results(),
        pipeline.status(),
        frames.clone(),
        &config.display,
        metrics.clone(),
    );
    let server = HttpServer::new(state, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();
    let capture_shutdown_rx = shutdown_tx.subscribe();

    let capture = CaptureLoop::new(
        source,
        pipeline.frame_sink(),
        pipeline.results(),
        OverlayRenderer::new(&config.display),
        frames,
        metrics,
        config.source.offer_every,
    );
    let mut capture_handle = capture.spawn(capture_shutdown_rx);

    let server_handle = server.run(server_shutdown_rx)?;

    let capture_finished = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, starting graceful shutdown.");
            None
        }
        result = &mut capture_handle => {
            tracing::info!("Frame source finished, starting graceful shutdown.");
            Some(result)
        }
    };

    let _ = shutdown_tx.send(());

    let capture_result = match capture_finished {
        Some(result) => result,
        None => capture_handle.await,
    };
    match capture_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Capture loop failed: {:?}", e),
        Err(e) => tracing::error!("Capture loop did not stop cleanly: {:?}", e),
    }

    pipeline.shutdown().await?;
    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("HTTP server failed: {:?}", e),
        Err(e) => tracing::error!("HTTP server did not stop cleanly: {:?}", e),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
