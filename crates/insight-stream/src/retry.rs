use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConnectionError;

/// Capped exponential reconnect policy for the event stream.
///
/// Delay for retry attempt `n` (0-indexed) is
/// `min(initial_backoff_ms * 2^n, max_backoff_ms)`, with no jitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Reconnect attempts allowed after the initial connection.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff before the first reconnect.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound for computed backoff.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl ReconnectPolicy {
    /// Creates a policy with the default backoff curve and a custom budget.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Overrides the initial backoff.
    pub fn with_initial_backoff_ms(mut self, initial_backoff_ms: u64) -> Self {
        self.initial_backoff_ms = initial_backoff_ms.max(1);
        self
    }

    /// Overrides the backoff cap.
    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms.max(1);
        self
    }

    /// Whether another reconnect fits in the budget.
    pub fn can_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Backoff before retry attempt `retries_done` (0-indexed).
    pub fn backoff_duration(&self, retries_done: u32) -> Duration {
        let doubling = 1u64 << retries_done.min(32);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(doubling)
            .min(self.max_backoff_ms.max(1));
        Duration::from_millis(delay)
    }

    /// Classifies a stream fault as retryable or permanent.
    ///
    /// The transport does not reliably expose a structured status for
    /// mid-stream faults, so "not found"-style failures are detected by
    /// message inspection.
    pub fn is_retryable(&self, error: &ConnectionError) -> bool {
        let text = error.to_string().to_ascii_lowercase();
        !(text.contains("404") || text.contains("not found"))
    }
}
