use crate::config::PipelineConfig;
use crate::frame::{EncodedImage, Frame};
use crate::frame_slot::FrameSlot;
use crate::inference::InferenceClient;
use crate::observer::PipelineObserver;
use crate::outcome::InferenceOutcome;
use crate::result_store::ResultStore;
use crate::throttle::Throttle;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    WaitingForFrame,
    Encoding,
    AwaitingResponse,
    Throttling,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::WaitingForFrame => "waiting_for_frame",
            WorkerState::Encoding => "encoding",
            WorkerState::AwaitingResponse => "awaiting_response",
            WorkerState::Throttling => "throttling",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

enum Step {
    WaitingForFrame,
    Encoding(Frame),
    AwaitingResponse(EncodedImage),
    Throttling,
}

impl Step {
    fn state(&self) -> WorkerState {
        match self {
            Step::WaitingForFrame => WorkerState::WaitingForFrame,
            Step::Encoding(_) => WorkerState::Encoding,
            Step::AwaitingResponse(_) => WorkerState::AwaitingResponse,
            Step::Throttling => WorkerState::Throttling,
        }
    }
}

/// Consumer side of the pipeline: drains the frame slot, calls the inference
/// service and publishes every outcome.
pub(crate) struct InferenceWorker<C: InferenceClient> {
    slot: Arc<FrameSlot>,
    results: Arc<ResultStore>,
    client: C,
    observer: Arc<dyn PipelineObserver>,
    instruction: String,
    timeout: Duration,
    jpeg_quality: u8,
    throttle: Throttle,
    state_tx: watch::Sender<WorkerState>,
}

impl<C: InferenceClient> InferenceWorker<C> {
    pub(crate) fn new(
        slot: Arc<FrameSlot>,
        results: Arc<ResultStore>,
        client: C,
        observer: Arc<dyn PipelineObserver>,
        config: &PipelineConfig,
        state_tx: watch::Sender<WorkerState>,
    ) -> Self {
        Self {
            slot,
            results,
            client,
            observer,
            instruction: config.instruction.clone(),
            timeout: config.timeout(),
            jpeg_quality: config.jpeg_quality,
            throttle: Throttle::new(
                config.min_interval(),
                config.backoff_factor,
                config.max_backoff(),
            ),
            state_tx,
        }
    }

    pub(crate) async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        tracing::info!("Inference worker started with client {}", self.client.name());
        let mut step = Step::WaitingForFrame;

        loop {
            self.state_tx.send_replace(step.state());

            step = match step {
                Step::WaitingForFrame => tokio::select! {
                    frame = self.slot.take() => Step::Encoding(frame),
                    _ = shutdown_rx.recv() => break,
                },
                Step::Encoding(frame) => match frame.encode_jpeg(self.jpeg_quality) {
                    Ok(image) => {
                        tracing::debug!(
                            "Encoded {}x{} frame into {} bytes",
                            frame.width(),
                            frame.height(),
                            image.len()
                        );
                        Step::AwaitingResponse(image)
                    }
                    Err(e) => {
                        tracing::error!("Failed to encode frame: {:?}", e);
                        self.complete(InferenceOutcome::other(e.to_string()), Duration::ZERO);
                        Step::Throttling
                    }
                },
                Step::AwaitingResponse(image) => {
                    let started = Instant::now();
                    let outcome = tokio::select! {
                        outcome = self.client.infer(&image, &self.instruction, self.timeout) => outcome,
                        _ = shutdown_rx.recv() => {
                            tracing::info!("Abandoning in-flight inference call on shutdown");
                            break;
                        }
                    };
                    self.complete(outcome, started.elapsed());
                    Step::Throttling
                }
                Step::Throttling => tokio::select! {
                    _ = self.throttle.wait() => Step::WaitingForFrame,
                    _ = shutdown_rx.recv() => break,
                },
            };
        }

        self.state_tx.send_replace(WorkerState::Stopped);
        tracing::info!("Inference worker stopped");
    }

    fn complete(&mut self, outcome: InferenceOutcome, elapsed: Duration) {
        match &outcome {
            InferenceOutcome::Success(text) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Inference succeeded: {}",
                text
            ),
            InferenceOutcome::Failure { kind, message } => tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                kind = kind.as_str(),
                "Inference failed: {}",
                message
            ),
        }

        self.observer.inference_completed(&outcome, elapsed);
        self.throttle.record(&outcome);
        let sequence = self.results.write(outcome);
        tracing::debug!("Published result #{}", sequence);
    }
}
