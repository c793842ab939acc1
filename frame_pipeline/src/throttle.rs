use crate::outcome::{FailureKind, InferenceOutcome};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

const MAX_BACKOFF_STEPS: u32 = 32;

/// Minimum spacing between remote calls, measured from the end of the
/// previous call. Consecutive connection failures stretch the spacing by
/// `backoff_factor` per failure, up to `max_interval`.
#[derive(Debug)]
pub(crate) struct Throttle {
    min_interval: Duration,
    backoff_factor: u32,
    max_interval: Duration,
    consecutive_connection_failures: u32,
    last_completed: Option<Instant>,
}

impl Throttle {
    pub(crate) fn new(min_interval: Duration, backoff_factor: u32, max_interval: Duration) -> Self {
        Self {
            min_interval,
            backoff_factor: backoff_factor.max(1),
            max_interval: max_interval.max(min_interval),
            consecutive_connection_failures: 0,
            last_completed: None,
        }
    }

    pub(crate) fn record(&mut self, outcome: &InferenceOutcome) {
        self.last_completed = Some(Instant::now());
        match outcome.failure_kind() {
            Some(FailureKind::ConnectionFailed) => {
                self.consecutive_connection_failures =
                    self.consecutive_connection_failures.saturating_add(1);
            }
            _ => self.consecutive_connection_failures = 0,
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        let steps = self
            .consecutive_connection_failures
            .saturating_sub(1)
            .min(MAX_BACKOFF_STEPS);

        let mut interval = self.min_interval;
        for _ in 0..steps {
            if self.backoff_factor == 1 || interval >= self.max_interval {
                break;
            }
            interval = interval.saturating_mul(self.backoff_factor);
        }
        interval.min(self.max_interval)
    }

    pub(crate) async fn wait(&self) {
        if let Some(last) = self.last_completed {
            sleep_until(last + self.interval()).await;
        }
    }
}
