use bytes::Bytes;
use futures::stream;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{sync::watch, time::sleep};
use tracing::instrument;

const FRAME_BOUNDARY: &str = "frame";

#[derive(Error, Debug)]
pub enum VideoStreamError {
    #[error("Http builder error: {0}")]
    HttpBuilderError(String),
}

/// Latest annotated JPEG, published by the capture loop. `None` means the
/// source has ended and open streams should close.
#[derive(Clone)]
pub struct AnnotatedFrames {
    tx: Arc<watch::Sender<Option<Bytes>>>,
}

impl Default for AnnotatedFrames {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotatedFrames {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn publish(&self, jpeg: Vec<u8>) {
        self.tx.send_replace(Some(Bytes::from(jpeg)));
    }

    pub fn close(&self) {
        self.tx.send_replace(None);
    }

    pub fn has_viewers(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Bytes>> {
        self.tx.subscribe()
    }
}

pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let part_header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        FRAME_BOUNDARY,
        jpeg.len()
    );
    let mut body = part_header.into_bytes();
    body.extend_from_slice(jpeg);
    body.extend_from_slice(b"\r\n");
    Bytes::from(body)
}

#[derive(Clone)]
pub struct VideoStream {
    pub frames: AnnotatedFrames,
    pub video_stream_delay: u64,
}

impl VideoStream {
    pub fn new(frames: AnnotatedFrames, video_stream_delay: u64) -> Self {
        Self {
            frames,
            video_stream_delay,
        }
    }

    pub fn content_type() -> String {
        format!("multipart/x-mixed-replace; boundary={}", FRAME_BOUNDARY)
    }

    #[instrument(skip(self))]
    pub fn generate_stream(self) -> impl futures::Stream<Item = Result<Bytes, VideoStreamError>> {
        let rx = self.frames.subscribe();
        let delay = Duration::from_millis(self.video_stream_delay);

        stream::unfold(rx, move |mut rx| async move {
            sleep(delay).await;
            if rx.changed().await.is_err() {
                return None;
            }
            let frame = rx.borrow_and_update().clone()?;
            Some((Ok::<_, VideoStreamError>(multipart_part(&frame)), rx))
        })
    }
}
