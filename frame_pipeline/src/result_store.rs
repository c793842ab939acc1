use crate::outcome::{FailureKind, InferenceOutcome};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

pub const PENDING_TEXT: &str = "Processing...";

/// What a renderer sees: the latest outcome, or `None` before the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSnapshot {
    pub sequence: u64,
    pub outcome: Option<InferenceOutcome>,
}

impl ResultSnapshot {
    fn pending() -> Self {
        Self {
            sequence: 0,
            outcome: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome.is_none()
    }

    pub fn text(&self) -> String {
        match &self.outcome {
            Some(outcome) => outcome.to_string(),
            None => PENDING_TEXT.to_string(),
        }
    }

    pub fn to_view(&self) -> ResultView {
        ResultView {
            sequence: self.sequence,
            text: self.text(),
            status: match &self.outcome {
                None => "pending",
                Some(outcome) => outcome.label(),
            },
            failure: self.outcome.as_ref().and_then(|o| o.failure_kind()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResultView {
    pub sequence: u64,
    pub text: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

/// Latest-value cache. Writers swap an `Arc`, readers clone it, so the lock is
/// only ever held for a pointer copy.
#[derive(Debug)]
pub(crate) struct ResultStore {
    current: RwLock<Arc<ResultSnapshot>>,
}

impl ResultStore {
    pub(crate) fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(ResultSnapshot::pending())),
        }
    }

    pub(crate) fn write(&self, outcome: InferenceOutcome) -> u64 {
        let mut current = self.current.write();
        let sequence = current.sequence + 1;
        *current = Arc::new(ResultSnapshot {
            sequence,
            outcome: Some(outcome),
        });
        sequence
    }

    pub(crate) fn read(&self) -> Arc<ResultSnapshot> {
        self.current.read().clone()
    }
}

/// Read-only handle given to renderers.
#[derive(Debug, Clone)]
pub struct ResultReader {
    store: Arc<ResultStore>,
}

impl ResultReader {
    pub(crate) fn new(store: Arc<ResultStore>) -> Self {
        Self { store }
    }

    pub fn current_result(&self) -> Arc<ResultSnapshot> {
        self.store.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_initial_read_is_sentinel() {
        let store = ResultStore::new();
        let snapshot = store.read();

        assert!(snapshot.is_pending());
        assert_eq!(snapshot.sequence, 0);
        assert_eq!(snapshot.text(), "Processing...");
        assert_eq!(snapshot.to_view().status, "pending");
    }

    #[test]
    fn test_read_reflects_write_immediately() {
        let store = ResultStore::new();
        store.write(InferenceOutcome::timeout());

        let snapshot = store.read();
        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.outcome, Some(InferenceOutcome::timeout()));
        assert_eq!(snapshot.text(), "Error: Timeout");

        let view = snapshot.to_view();
        assert_eq!(view.status, "timeout");
        assert_eq!(view.failure, Some(FailureKind::Timeout));
    }

    #[test]
    fn test_last_write_wins() {
        let store = ResultStore::new();
        for i in 1..=50 {
            store.write(InferenceOutcome::Success(format!("result {}", i)));
        }

        let snapshot = store.read();
        assert_eq!(snapshot.sequence, 50);
        assert_eq!(snapshot.text(), "result 50");
    }

    #[test]
    fn test_concurrent_readers_see_whole_outcomes() {
        let store = Arc::new(ResultStore::new());
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader = ResultReader::new(store.clone());
                let done = done.clone();
                thread::spawn(move || {
                    let mut last_seen = 0;
                    while !done.load(Ordering::Acquire) {
                        let snapshot = reader.current_result();
                        assert!(snapshot.sequence >= last_seen);
                        last_seen = snapshot.sequence;
                        if let Some(InferenceOutcome::Success(text)) = &snapshot.outcome {
                            assert_eq!(text, &format!("result {}", snapshot.sequence));
                        }
                    }
                })
            })
            .collect();

        for i in 1..=1_000u64 {
            let written = store.write(InferenceOutcome::Success(format!("result {}", i)));
            assert_eq!(written, i);
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.read().text(), "result 1000");
    }
}
