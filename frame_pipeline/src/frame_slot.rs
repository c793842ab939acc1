use crate::frame::Frame;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

/// Capacity-one hand-off between the frame source and the inference worker.
///
/// `put` never waits: when a frame is already parked the incoming one is
/// dropped and the parked frame stays. `take` waits until a frame is parked
/// and leaves the slot empty.
#[derive(Debug, Default)]
pub(crate) struct FrameSlot {
    frame: Mutex<Option<Frame>>,
    notify: Notify,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotStats {
    pub accepted: u64,
    pub dropped: u64,
}

impl FrameSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the frame was parked, `false` when it was dropped.
    pub(crate) fn put(&self, frame: Frame) -> bool {
        {
            let mut slot = self.frame.lock();
            if slot.is_some() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            *slot = Some(frame);
        }
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
        true
    }

    pub(crate) async fn take(&self) -> Frame {
        loop {
            if let Some(frame) = self.frame.lock().take() {
                return frame;
            }
            // A permit left behind by a put we already drained wakes us early;
            // the loop re-checks.
            self.notify.notified().await;
        }
    }

    pub(crate) fn stats(&self) -> SlotStats {
        SlotStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    fn occupied(&self) -> bool {
        self.frame.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::time::timeout;

    fn frame(tag: u8) -> Frame {
        Frame::from_rgb(2, 1, vec![tag; 6]).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_take_empties_slot() {
        let slot = FrameSlot::new();

        assert!(slot.put(frame(1)));
        assert!(slot.occupied());

        let taken = slot.take().await;
        assert_eq!(taken, frame(1));
        assert!(!slot.occupied());
    }

    #[tokio::test]
    async fn test_put_when_full_keeps_first_frame() {
        let slot = FrameSlot::new();

        assert!(slot.put(frame(1)));
        assert!(!slot.put(frame(2)));

        assert_eq!(slot.take().await, frame(1));
        assert!(!slot.occupied());
        assert_eq!(
            slot.stats(),
            SlotStats {
                accepted: 1,
                dropped: 1
            }
        );
    }

    #[tokio::test]
    async fn test_take_returns_frame_accepted_after_drain() {
        let slot = FrameSlot::new();

        slot.put(frame(1));
        slot.put(frame(2));
        slot.take().await;

        slot.put(frame(3));
        slot.put(frame(4));
        assert_eq!(slot.take().await, frame(3));
    }

    #[tokio::test]
    async fn test_never_holds_more_than_one_frame() {
        let slot = FrameSlot::new();
        let mut parked = 0usize;

        for step in 0..200u32 {
            if step % 7 == 3 {
                if parked == 1 {
                    slot.take().await;
                    parked = 0;
                }
            } else if slot.put(frame((step % 250) as u8)) {
                parked += 1;
            }
            assert!(parked <= 1);
            assert_eq!(slot.occupied(), parked == 1);
        }
    }

    #[tokio::test]
    async fn test_take_waits_for_put() {
        let slot = Arc::new(FrameSlot::new());

        let consumer = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.take().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        slot.put(frame(9));
        let taken = timeout(Duration::from_secs(1), consumer)
            .await
            .expect("take should wake up after put")
            .unwrap();
        assert_eq!(taken, frame(9));
    }

    #[tokio::test]
    async fn test_stale_permit_does_not_return_empty() {
        let slot = FrameSlot::new();

        // Leaves a notify permit behind after the frame is drained.
        slot.put(frame(1));
        slot.take().await;

        let pending = timeout(Duration::from_millis(50), slot.take()).await;
        assert!(pending.is_err());
    }

    #[test]
    fn test_put_is_constant_time_while_consumer_is_absent() {
        let slot = FrameSlot::new();
        slot.put(frame(0));

        let start = Instant::now();
        for i in 0..10_000u32 {
            assert!(!slot.put(frame((i % 250) as u8)));
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(slot.stats().dropped, 10_000);
    }
}
