use crate::errors::StreamFailure;
use crate::event::{CardHeader, FinalSummary, StatusUpdate, StreamEvent};

/// Callback contract for consumers of a processed session.
///
/// All methods default to no-ops so observers implement only what they
/// display. Event callbacks fire in arrival order, spaced by the pacing
/// scheduler; `on_settled` fires a fixed delay after `on_complete`.
pub trait StreamObserver: Send + Sync {
    /// A new session run was admitted and the upload is about to start.
    fn on_processing_started(&self) {}

    /// Upload progress in percent, monotonically non-decreasing.
    fn on_upload_progress(&self, _percent: u8) {}

    fn on_status(&self, _update: StatusUpdate) {}

    fn on_card_header(&self, _header: CardHeader) {}

    fn on_summary_bullets(&self, _bullets: Vec<String>) {}

    fn on_recall_anchor(&self, _anchor: String) {}

    fn on_action_item(&self, _item: String) {}

    /// Terminal: insight generation completed.
    fn on_complete(&self, _summary: FinalSummary) {}

    /// Terminal: the flow resolved to retrieval of past related entries.
    fn on_recall_results(&self, _payload: serde_json::Value) {}

    /// Terminal: upload failure, non-retryable fault, or exhausted retries.
    fn on_error(&self, _failure: StreamFailure) {}

    /// Fired once, `settle_delay` after `on_complete`, to mark processing
    /// finished.
    fn on_settled(&self) {}
}

/// Routes a typed event to its observer callback.
///
/// The match is exhaustive on purpose: adding an event kind without deciding
/// how it reaches observers must not compile.
pub(crate) fn dispatch_event(observer: &dyn StreamObserver, event: StreamEvent) {
    match event {
        StreamEvent::Status(update) => observer.on_status(update),
        StreamEvent::CardHeader(header) => observer.on_card_header(header),
        StreamEvent::SummaryBullets(bullets) => observer.on_summary_bullets(bullets),
        StreamEvent::RecallAnchor(anchor) => observer.on_recall_anchor(anchor),
        StreamEvent::ActionItem(item) => observer.on_action_item(item),
        StreamEvent::Final(summary) => observer.on_complete(summary),
        StreamEvent::RecallResults(payload) => observer.on_recall_results(payload),
    }
}
