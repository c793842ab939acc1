use crate::frame::EncodedImage;
use crate::outcome::{FailureKind, InferenceOutcome};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Timeout")]
    Timeout,
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Inference service returned HTTP status {0}")]
    Status(u16),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Request failed: {0}")]
    Request(String),
}

impl InferenceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            InferenceError::Timeout => FailureKind::Timeout,
            InferenceError::ConnectionFailed(_) => FailureKind::ConnectionFailed,
            _ => FailureKind::Other,
        }
    }
}

impl From<InferenceError> for InferenceOutcome {
    fn from(err: InferenceError) -> Self {
        match err.kind() {
            FailureKind::Timeout => InferenceOutcome::timeout(),
            FailureKind::ConnectionFailed => InferenceOutcome::connection_failed(),
            FailureKind::Other => InferenceOutcome::other(err.to_string()),
        }
    }
}

#[async_trait]
pub trait InferenceClient: Send + Sync + 'static {
    /// One remote call, no retries. Implementations should honour `timeout`
    /// themselves; `infer` enforces it regardless.
    async fn generate(
        &self,
        image: &EncodedImage,
        instruction: &str,
        timeout: Duration,
    ) -> Result<String, InferenceError>;

    /// Total wrapper around `generate`: every call ends in exactly one outcome.
    async fn infer(
        &self,
        image: &EncodedImage,
        instruction: &str,
        timeout: Duration,
    ) -> InferenceOutcome {
        match tokio::time::timeout(timeout, self.generate(image, instruction, timeout)).await {
            Ok(Ok(text)) => InferenceOutcome::Success(text),
            Ok(Err(err)) => err.into(),
            Err(_) => InferenceOutcome::timeout(),
        }
    }

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedClient {
        delay: Duration,
        reply: Result<String, InferenceError>,
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        async fn generate(
            &self,
            _image: &EncodedImage,
            _instruction: &str,
            _timeout: Duration,
        ) -> Result<String, InferenceError> {
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn image() -> EncodedImage {
        EncodedImage::new(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_within_timeout() {
        let client = ScriptedClient {
            delay: Duration::from_millis(200),
            reply: Ok("No risks present".to_string()),
        };

        let outcome = client
            .infer(&image(), "describe", Duration::from_secs(30))
            .await;
        assert_eq!(outcome, InferenceOutcome::Success("No risks present".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_becomes_timeout() {
        let client = ScriptedClient {
            delay: Duration::from_secs(60),
            reply: Ok("too late".to_string()),
        };

        let outcome = client
            .infer(&image(), "describe", Duration::from_secs(30))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(outcome.to_string(), "Error: Timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_error_maps_to_one_outcome() {
        let cases = vec![
            (InferenceError::Timeout, FailureKind::Timeout),
            (
                InferenceError::ConnectionFailed("refused".into()),
                FailureKind::ConnectionFailed,
            ),
            (InferenceError::Status(500), FailureKind::Other),
            (
                InferenceError::MalformedResponse("eof".into()),
                FailureKind::Other,
            ),
            (InferenceError::Request("builder".into()), FailureKind::Other),
        ];

        for (err, kind) in cases {
            let client = ScriptedClient {
                delay: Duration::ZERO,
                reply: Err(err),
            };
            let outcome = client
                .infer(&image(), "describe", Duration::from_secs(1))
                .await;
            assert_eq!(outcome.failure_kind(), Some(kind));
        }
    }

    #[test]
    fn test_other_failures_keep_their_message() {
        let outcome: InferenceOutcome = InferenceError::Status(503).into();
        assert_eq!(
            outcome.to_string(),
            "Error: Inference service returned HTTP status 503"
        );

        let outcome: InferenceOutcome = InferenceError::ConnectionFailed("refused".into()).into();
        assert_eq!(outcome.to_string(), "Error: Connection failed");
    }
}
