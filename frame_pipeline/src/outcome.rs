use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    ConnectionFailed,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ConnectionFailed => "connection_failed",
            FailureKind::Other => "other",
        }
    }
}

/// Result of one remote analysis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceOutcome {
    Success(String),
    Failure { kind: FailureKind, message: String },
}

impl InferenceOutcome {
    pub fn timeout() -> Self {
        InferenceOutcome::Failure {
            kind: FailureKind::Timeout,
            message: "Timeout".to_string(),
        }
    }

    pub fn connection_failed() -> Self {
        InferenceOutcome::Failure {
            kind: FailureKind::ConnectionFailed,
            message: "Connection failed".to_string(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        InferenceOutcome::Failure {
            kind: FailureKind::Other,
            message: message.into(),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            InferenceOutcome::Success(_) => None,
            InferenceOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InferenceOutcome::Success(_))
    }

    /// Label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            InferenceOutcome::Success(_) => "success",
            InferenceOutcome::Failure { kind, .. } => kind.as_str(),
        }
    }
}

/// Text shown on the overlay: the analysis itself, or `Error: <message>`.
impl fmt::Display for InferenceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceOutcome::Success(text) => write!(f, "{}", text),
            InferenceOutcome::Failure { message, .. } => write!(f, "Error: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_text() {
        assert_eq!(
            InferenceOutcome::Success("No risks present".into()).to_string(),
            "No risks present"
        );
        assert_eq!(InferenceOutcome::timeout().to_string(), "Error: Timeout");
        assert_eq!(
            InferenceOutcome::connection_failed().to_string(),
            "Error: Connection failed"
        );
        assert_eq!(
            InferenceOutcome::other("HTTP status 500").to_string(),
            "Error: HTTP status 500"
        );
    }

    #[test]
    fn test_failure_kind() {
        assert_eq!(InferenceOutcome::Success("ok".into()).failure_kind(), None);
        assert_eq!(
            InferenceOutcome::timeout().failure_kind(),
            Some(FailureKind::Timeout)
        );
        assert_eq!(InferenceOutcome::other("x").label(), "other");
    }
}
