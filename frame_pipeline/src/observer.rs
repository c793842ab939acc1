use crate::outcome::InferenceOutcome;
use std::time::Duration;

/// Hooks for metrics. Every method defaults to doing nothing.
pub trait PipelineObserver: Send + Sync + 'static {
    fn frame_offered(&self, _accepted: bool) {}

    fn inference_completed(&self, _outcome: &InferenceOutcome, _elapsed: Duration) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
