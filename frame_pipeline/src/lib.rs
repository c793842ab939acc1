mod frame_slot;
mod result_store;
mod throttle;
mod worker;

pub mod config;
pub mod frame;
pub mod inference;
pub mod observer;
pub mod ollama;
pub mod outcome;
pub mod pipeline;

pub use config::PipelineConfig;
pub use frame::{EncodedImage, Frame, FrameError};
pub use frame_slot::SlotStats;
pub use inference::{InferenceClient, InferenceError};
pub use observer::{NoopObserver, PipelineObserver};
pub use ollama::OllamaClient;
pub use outcome::{FailureKind, InferenceOutcome};
pub use pipeline::{FrameSink, Pipeline, PipelineError, PipelineStatus};
pub use result_store::{ResultReader, ResultSnapshot, ResultView, PENDING_TEXT};
pub use worker::WorkerState;
