use std::time::Duration;

use crate::errors::ClientError;

/// Configuration for the backend HTTP transport.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Base URL of the insight backend.
    pub base_url: String,
    /// Token used for bearer auth on every request.
    pub bearer_token: String,
    /// HTTP timeout for bounded requests (upload, recall).
    ///
    /// Never applied to the event stream, which stays open for the lifetime
    /// of a session.
    pub timeout: Duration,
}

impl ApiConfig {
    /// Creates a config with the default timeout.
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `INSIGHT_API_BASE_URL` and `INSIGHT_API_TOKEN`.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var("INSIGHT_API_BASE_URL").unwrap_or_default();
        if base_url.trim().is_empty() {
            return Err(ClientError::Config(
                "missing INSIGHT_API_BASE_URL for the HTTP transport".into(),
            ));
        }
        let bearer_token = std::env::var("INSIGHT_API_TOKEN").unwrap_or_default();
        if bearer_token.trim().is_empty() {
            return Err(ClientError::Config(
                "missing INSIGHT_API_TOKEN for the HTTP transport".into(),
            ));
        }
        Ok(Self::new(base_url, bearer_token))
    }

    /// Overrides the bounded-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn capture_url(&self) -> String {
        format!("{}/api/v1/capture", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn stream_url(&self, session_id: &str, last_event_id: Option<&str>) -> String {
        let base = format!(
            "{}/api/v1/stream/{session_id}",
            self.base_url.trim_end_matches('/')
        );
        match last_event_id.filter(|id| !id.is_empty()) {
            Some(id) => format!("{base}?last_event_id={id}"),
            None => base,
        }
    }

    pub(crate) fn recall_url(&self) -> String {
        format!("{}/api/v1/recall", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_tolerate_trailing_slash_on_base() {
        let config = ApiConfig::new("http://localhost:8000/", "token");
        assert_eq!(config.capture_url(), "http://localhost:8000/api/v1/capture");
        assert_eq!(
            config.stream_url("abc123", None),
            "http://localhost:8000/api/v1/stream/abc123"
        );
        assert_eq!(config.recall_url(), "http://localhost:8000/api/v1/recall");
    }

    #[test]
    fn stream_url_carries_cursor_only_when_present() {
        let config = ApiConfig::new("http://localhost:8000", "token");
        assert_eq!(
            config.stream_url("abc123", Some("17")),
            "http://localhost:8000/api/v1/stream/abc123?last_event_id=17"
        );
        assert_eq!(
            config.stream_url("abc123", Some("")),
            "http://localhost:8000/api/v1/stream/abc123"
        );
    }
}
