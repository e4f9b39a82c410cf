use std::time::Duration;

use tokio::time::Instant;

/// Client-side delivery pacing for observer callbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacingConfig {
    /// Spacing added per delivered event (`sequence_index * interval`).
    pub interval: Duration,
    /// Delay between the completion callback and the settle callback.
    pub settle_delay: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            settle_delay: Duration::from_millis(3_000),
        }
    }
}

impl PacingConfig {
    /// Overrides the per-event pacing interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Overrides the post-completion settle delay.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}

/// Assigns strictly increasing delivery deadlines to a session's events.
///
/// Each event is scheduled at `arrival + sequence_index * interval`, which
/// smooths bursts while a single FIFO dispatcher preserves arrival order. The
/// sequence counter belongs to one session run and resets only when the run
/// completes or is reset.
#[derive(Debug)]
pub(crate) struct Pacer {
    interval: Duration,
    seq: u64,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, seq: 0 }
    }

    /// Returns the delivery deadline for the next event and advances the
    /// sequence counter.
    pub fn schedule(&mut self, arrival: Instant) -> Instant {
        let steps = u32::try_from(self.seq.min(1 << 20)).unwrap_or(u32::MAX);
        let deadline = arrival + self.interval * steps;
        self.seq += 1;
        deadline
    }

}
