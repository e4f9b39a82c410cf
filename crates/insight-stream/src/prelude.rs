//! Common imports for typical client usage.
//!
//! This module intentionally exports the most frequently used client and
//! observer types so examples and application code need fewer import lines.
pub use crate::{
    AbortHandle, AudioAsset, CardHeader, ClientError, FinalSummary, InsightCard, InsightClient,
    InsightClientBuilder, PacingConfig, ProcessHandle, ReconnectPolicy, SessionOutcome,
    SnapshotObserver, StatusUpdate, StreamEvent, StreamFailure, StreamObserver, StreamPhase,
    StreamSnapshot,
};
