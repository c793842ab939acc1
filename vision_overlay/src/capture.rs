use crate::overlay::{encode_jpg, OverlayError, OverlayRenderer};
use crate::source::{mat_to_frame, FrameSource, SourceError};
use crate::stream::AnnotatedFrames;
use crate::telemetry::Metrics;
use frame_pipeline::{FrameSink, ResultReader};
use opencv::core::Mat;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::task::JoinHandle;

const FPS_WINDOW: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Frame source error: {0}")]
    Source(#[from] SourceError),
    #[error("Overlay error: {0}")]
    Overlay(#[from] OverlayError),
}

/// Producer loop: reads the source at its own rate, offers frames to the
/// pipeline and renders the latest result for the video feed.
pub struct CaptureLoop {
    source: FrameSource,
    sink: FrameSink,
    results: ResultReader,
    renderer: OverlayRenderer,
    frames: AnnotatedFrames,
    metrics: Arc<Metrics>,
    offer_every: u64,
}

impl CaptureLoop {
    pub fn new(
        source: FrameSource,
        sink: FrameSink,
        results: ResultReader,
        renderer: OverlayRenderer,
        frames: AnnotatedFrames,
        metrics: Arc<Metrics>,
        offer_every: u64,
    ) -> Self {
        Self {
            source,
            sink,
            results,
            renderer,
            frames,
            metrics,
            offer_every: offer_every.max(1),
        }
    }

    /// OpenCV reads block, so the loop runs on the blocking pool.
    pub fn spawn(
        self,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<Result<(), CaptureError>> {
        tokio::task::spawn_blocking(move || self.run(shutdown_rx))
    }

    fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), CaptureError> {
        tracing::info!("Capture loop started on {}", self.source.description());
        let frame_delay = self.source.frame_delay();
        let mut frame_count: u64 = 0;
        let mut window_start = Instant::now();
        let mut window_frames: u64 = 0;

        let result = loop {
            match shutdown_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Closed) => {
                    tracing::info!("Capture loop received shutdown signal");
                    break Ok(());
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Lagged(_)) => {}
            }

            let started = Instant::now();
            let mut frame = match self.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!("Frame source {} is exhausted", self.source.description());
                    break Ok(());
                }
                Err(e) => break Err(CaptureError::from(e)),
            };

            frame_count += 1;
            if frame_count % self.offer_every == 0 {
                self.offer(&frame);
            }

            if self.frames.has_viewers() {
                if let Err(e) = self.render(&mut frame) {
                    tracing::error!("Failed to render overlay: {:?}", e);
                }
            }

            window_frames += 1;
            let window = window_start.elapsed();
            if window >= FPS_WINDOW {
                let fps = window_frames as f64 / window.as_secs_f64();
                self.metrics.record_camera_fps(fps);
                tracing::debug!("Capturing at {:.1} fps", fps);
                window_start = Instant::now();
                window_frames = 0;
            }

            if let Some(remaining) = frame_delay.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        };

        self.frames.close();
        tracing::info!("Capture loop stopped after {} frames", frame_count);
        result
    }

    fn offer(&self, frame: &Mat) {
        match mat_to_frame(frame) {
            Ok(frame) => {
                if !self.sink.offer(frame) {
                    tracing::trace!("Inference worker busy, frame dropped");
                }
            }
            Err(e) => tracing::error!("Failed to convert frame: {:?}", e),
        }
    }

    fn render(&self, frame: &mut Mat) -> Result<(), CaptureError> {
        let snapshot = self.results.current_result();
        self.renderer.annotate(frame, &snapshot.text())?;
        self.frames.publish(encode_jpg(frame)?);
        Ok(())
    }
}
