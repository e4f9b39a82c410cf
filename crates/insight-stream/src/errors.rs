/// Errors raised while uploading a recorded audio asset to the capture
/// endpoint.
///
/// Upload faults are never retried by the client; they terminate the current
/// attempt and are surfaced to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// Capture endpoint answered with a non-success status.
    #[error("capture upload failed with status {status}: {message}")]
    Status { status: u16, message: String },
    /// Network transport failed before a response was received.
    #[error("capture upload transport error: {message}")]
    Transport { message: String },
    /// Capture endpoint answered successfully but the response body was
    /// unusable (malformed JSON, missing session id).
    #[error("capture response invalid: {message}")]
    Invalid { message: String },
}

impl UploadError {
    /// Creates a status-level upload error.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Creates a transport-level upload error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an invalid-response upload error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Returns the raw message carried by this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Status { message, .. }
            | Self::Transport { message }
            | Self::Invalid { message } => message,
        }
    }
}

/// Faults on the server-sent event stream.
///
/// Connection errors pass through the reconnect policy before anything is
/// visible to observers; only non-retryable or budget-exhausted faults cross
/// that boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Stream handshake answered with a non-success status.
    #[error("stream handshake failed with status {status}: {message}")]
    Handshake { status: u16, message: String },
    /// Socket-level fault while connecting or reading frames.
    #[error("stream transport error: {message}")]
    Transport { message: String },
}

impl ConnectionError {
    /// Creates a handshake-level connection error.
    pub fn handshake(status: u16, message: impl Into<String>) -> Self {
        Self::Handshake {
            status,
            message: message.into(),
        }
    }

    /// Creates a transport-level connection error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns the raw message carried by this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Handshake { message, .. } | Self::Transport { message } => message,
        }
    }
}

/// Terminal failure delivered through `StreamObserver::on_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamFailure {
    /// The audio capture upload failed; no stream was opened.
    #[error(transparent)]
    Upload(UploadError),
    /// The event stream failed with a non-retryable fault or after the retry
    /// budget was exhausted.
    #[error(transparent)]
    Connection(ConnectionError),
    /// The session was cancelled before it could terminate.
    #[error("processing cancelled")]
    Cancelled,
}

impl StreamFailure {
    /// Returns a single human-readable description of the failure.
    ///
    /// When the underlying fault message is JSON with a `detail` field (the
    /// backend's error body shape), that field is preferred over the raw
    /// message.
    pub fn user_message(&self) -> String {
        let raw = match self {
            Self::Upload(err) => err.message(),
            Self::Connection(err) => err.message(),
            Self::Cancelled => return "Processing cancelled".to_string(),
        };
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw)
            && let Some(detail) = value.get("detail").and_then(|v| v.as_str())
        {
            return detail.to_string();
        }
        if raw.trim().is_empty() {
            "Failed to process audio stream".to_string()
        } else {
            raw.to_string()
        }
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client or transport configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid use of the client API (for example overlapping sessions).
    #[error("validation error: {0}")]
    Validation(String),
    /// Terminal failure of a processed session.
    #[error(transparent)]
    Failed(StreamFailure),
    /// The session was cancelled before a terminal result was produced.
    #[error("cancelled")]
    Cancelled,
    /// Internal invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<StreamFailure> for ClientError {
    fn from(value: StreamFailure) -> Self {
        ClientError::Failed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_json_detail_field() {
        let failure = StreamFailure::Connection(ConnectionError::handshake(
            404,
            r#"{"detail":"Session not found"}"#,
        ));
        assert_eq!(failure.user_message(), "Session not found");
    }

    #[test]
    fn user_message_falls_back_to_raw_message() {
        let failure = StreamFailure::Connection(ConnectionError::transport("socket reset"));
        assert_eq!(failure.user_message(), "socket reset");
    }

    #[test]
    fn user_message_ignores_json_without_detail() {
        let failure = StreamFailure::Upload(UploadError::status(500, r#"{"error":"boom"}"#));
        assert_eq!(failure.user_message(), r#"{"error":"boom"}"#);
    }

    #[test]
    fn user_message_has_generic_fallback_for_empty_messages() {
        let failure = StreamFailure::Connection(ConnectionError::transport(""));
        assert_eq!(failure.user_message(), "Failed to process audio stream");
    }

    #[test]
    fn cancelled_failure_has_fixed_message() {
        assert_eq!(
            StreamFailure::Cancelled.user_message(),
            "Processing cancelled"
        );
    }
}
