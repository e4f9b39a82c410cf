//! Resumable streaming client for voice-note insight processing.
//!
//! A recorded audio asset is uploaded to the capture endpoint, then typed
//! insight events are consumed from a server-push stream with paced observer
//! delivery, cursor-based resume, and bounded reconnects.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use insight_stream::http::{ApiConfig, HttpTransport};
//! use insight_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = InsightClient::builder()
//!     .transport(Arc::new(HttpTransport::new(ApiConfig::from_env()?)?))
//!     .build()?;
//!
//! let observer = Arc::new(SnapshotObserver::new());
//! let handle = client.process(AudioAsset::from_path("note.m4a"), observer.clone())?;
//!
//! match handle.finish().await? {
//!     SessionOutcome::Insight(summary) => println!("insight {}", summary.session_id),
//!     SessionOutcome::Recall(payload) => println!("recall {payload}"),
//! }
//! println!("{:?}", observer.snapshot());
//! # Ok(())
//! # }
//! ```

/// Client entry point, session orchestration, and lifecycle handles.
pub mod client;
/// Public error types used by the client API.
pub mod errors;
/// Typed stream events and their wire parsing.
pub mod event;
/// Production HTTP transport.
pub mod http;
/// Observer contract for consuming session callbacks.
pub mod observer;
/// Callback pacing configuration and scheduling.
pub mod pacing;
/// Common imports for typical usage.
pub mod prelude;
/// Reconnect budget, backoff curve, and fault classification.
pub mod retry;
/// Per-session resume cursor and retry bookkeeping.
pub mod session;
/// Ready-made observer projecting callbacks into displayable state.
pub mod snapshot;
/// Transport contract between the orchestrator and the network.
pub mod transport;

pub use client::{
    AbortHandle, InsightClient, InsightClientBuilder, ProcessHandle, SessionOutcome, StreamPhase,
};
pub use errors::{ClientError, ConnectionError, StreamFailure, UploadError};
pub use event::{CardHeader, FinalSummary, StatusUpdate, StreamEvent};
pub use observer::StreamObserver;
pub use pacing::PacingConfig;
pub use retry::ReconnectPolicy;
pub use snapshot::{InsightCard, SnapshotObserver, StreamSnapshot};
pub use transport::{AudioAsset, CaptureResult, EventFrame, EventStreamHandle, IngestTransport};
