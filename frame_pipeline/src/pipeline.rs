use crate::config::PipelineConfig;
use crate::frame::Frame;
use crate::frame_slot::{FrameSlot, SlotStats};
use crate::inference::InferenceClient;
use crate::observer::{NoopObserver, PipelineObserver};
use crate::result_store::{ResultReader, ResultStore};
use crate::worker::{InferenceWorker, WorkerState};
use std::sync::Arc;
use thiserror::Error;
use tokio::{
    sync::{broadcast, watch},
    task::{JoinError, JoinHandle},
};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    #[error("Inference worker did not stop cleanly: {0}")]
    WorkerJoin(#[from] JoinError),
}

/// Producer-side handle. Cloned into whatever drives frame acquisition.
#[derive(Clone)]
pub struct FrameSink {
    slot: Arc<FrameSlot>,
    observer: Arc<dyn PipelineObserver>,
}

impl FrameSink {
    /// Never waits. Returns whether the frame was handed to the worker; a
    /// `false` means a previous frame is still waiting and this one was dropped.
    pub fn offer(&self, frame: Frame) -> bool {
        let accepted = self.slot.put(frame);
        self.observer.frame_offered(accepted);
        accepted
    }
}

/// Read-only view of the worker for health and diagnostics.
#[derive(Clone)]
pub struct PipelineStatus {
    slot: Arc<FrameSlot>,
    state_rx: watch::Receiver<WorkerState>,
}

impl PipelineStatus {
    pub fn worker_state(&self) -> WorkerState {
        *self.state_rx.borrow()
    }

    pub fn slot_stats(&self) -> SlotStats {
        self.slot.stats()
    }
}

/// Owns the frame slot, the result store and the inference worker task.
pub struct Pipeline {
    slot: Arc<FrameSlot>,
    results: Arc<ResultStore>,
    observer: Arc<dyn PipelineObserver>,
    shutdown_tx: broadcast::Sender<()>,
    state_rx: watch::Receiver<WorkerState>,
    worker: JoinHandle<()>,
}

impl Pipeline {
    pub fn start<C: InferenceClient>(
        client: C,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        Self::start_with_observer(client, config, Arc::new(NoopObserver))
    }

    /// Must be called from inside a tokio runtime.
    pub fn start_with_observer<C: InferenceClient>(
        client: C,
        config: &PipelineConfig,
        observer: Arc<dyn PipelineObserver>,
    ) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::InvalidConfig)?;

        let slot = Arc::new(FrameSlot::new());
        let results = Arc::new(ResultStore::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (state_tx, state_rx) = watch::channel(WorkerState::WaitingForFrame);

        let worker = InferenceWorker::new(
            slot.clone(),
            results.clone(),
            client,
            observer.clone(),
            config,
            state_tx,
        );
        let worker = tokio::spawn(worker.run(shutdown_rx));

        tracing::info!(
            timeout_ms = config.timeout_ms,
            min_interval_ms = config.min_interval_ms,
            jpeg_quality = config.jpeg_quality,
            "Frame pipeline started"
        );

        Ok(Self {
            slot,
            results,
            observer,
            shutdown_tx,
            state_rx,
            worker,
        })
    }

    pub fn frame_sink(&self) -> FrameSink {
        FrameSink {
            slot: self.slot.clone(),
            observer: self.observer.clone(),
        }
    }

    pub fn results(&self) -> ResultReader {
        ResultReader::new(self.results.clone())
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            slot: self.slot.clone(),
            state_rx: self.state_rx.clone(),
        }
    }

    pub fn worker_state(&self) -> WorkerState {
        *self.state_rx.borrow()
    }

    pub fn slot_stats(&self) -> SlotStats {
        self.slot.stats()
    }

    /// Signals the worker and waits for it to exit. An in-flight inference
    /// call is abandoned.
    pub async fn shutdown(self) -> Result<(), PipelineError> {
        tracing::info!("Stopping frame pipeline");
        let _ = self.shutdown_tx.send(());
        self.worker.await?;

        let stats = self.slot.stats();
        tracing::info!(
            accepted = stats.accepted,
            dropped = stats.dropped,
            "Frame pipeline stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::EncodedImage;
    use crate::inference::InferenceError;
    use crate::outcome::InferenceOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    struct EchoClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceClient for EchoClient {
        async fn generate(
            &self,
            image: &EncodedImage,
            instruction: &str,
            _timeout: Duration,
        ) -> Result<String, InferenceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(format!("{} #{} ({} bytes)", instruction, call, image.len()))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        accepted: AtomicU64,
        dropped: AtomicU64,
        completed: AtomicU64,
    }

    impl PipelineObserver for CountingObserver {
        fn frame_offered(&self, accepted: bool) {
            if accepted {
                self.accepted.fetch_add(1, Ordering::SeqCst);
            } else {
                self.dropped.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn inference_completed(&self, _outcome: &InferenceOutcome, _elapsed: Duration) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default().with_instruction("Describe the scene")
    }

    fn frame() -> Frame {
        Frame::from_rgb(8, 6, vec![90; 8 * 6 * 3]).unwrap()
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let client = EchoClient {
            calls: AtomicUsize::new(0),
        };
        let result = Pipeline::start(client, &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_start_as_processing() {
        let pipeline = Pipeline::start(
            EchoClient {
                calls: AtomicUsize::new(0),
            },
            &config(),
        )
        .unwrap();

        assert_eq!(pipeline.results().current_result().text(), "Processing...");
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_flow_to_results() {
        let observer = Arc::new(CountingObserver::default());
        let pipeline = Pipeline::start_with_observer(
            EchoClient {
                calls: AtomicUsize::new(0),
            },
            &config(),
            observer.clone(),
        )
        .unwrap();
        let sink = pipeline.frame_sink();
        let reader = pipeline.results();

        // A 30 fps source for five seconds against a 0.5 s call plus 1 s spacing.
        for _ in 0..150 {
            sink.offer(frame());
            tokio::time::sleep(Duration::from_millis(33)).await;
        }

        let snapshot = reader.current_result();
        assert!(snapshot.sequence >= 3);
        assert!(snapshot.text().starts_with("Describe the scene #"));

        let stats = pipeline.slot_stats();
        assert_eq!(stats.accepted + stats.dropped, 150);
        assert!(stats.dropped > stats.accepted);
        assert_eq!(observer.accepted.load(Ordering::SeqCst), stats.accepted);
        assert_eq!(observer.dropped.load(Ordering::SeqCst), stats.dropped);
        assert_eq!(observer.completed.load(Ordering::SeqCst), snapshot.sequence);

        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_worker() {
        let pipeline = Pipeline::start(
            EchoClient {
                calls: AtomicUsize::new(0),
            },
            &config(),
        )
        .unwrap();
        let sink = pipeline.frame_sink();
        let reader = pipeline.results();

        sink.offer(frame());
        tokio::time::sleep(Duration::from_secs(2)).await;
        let status = pipeline.status();
        pipeline.shutdown().await.unwrap();
        assert_eq!(status.worker_state(), WorkerState::Stopped);

        let before = reader.current_result().sequence;
        sink.offer(frame());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(reader.current_result().sequence, before);
    }
}
