use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::StreamFailure;
use crate::event::{CardHeader, FinalSummary, StatusUpdate};
use crate::observer::StreamObserver;

/// Insight card fields accumulated incrementally from stream events.
///
/// Partial until the session terminates.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct InsightCard {
    pub title: Option<String>,
    pub vibe: Option<String>,
    pub card_type: Option<String>,
    pub bullets: Vec<String>,
    pub recall_anchor: Option<String>,
    pub action_item: Option<String>,
}

/// Displayable projection of a session's latest state.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct StreamSnapshot {
    pub phase: String,
    pub message: String,
    pub card: InsightCard,
    pub recall_results: Option<serde_json::Value>,
    pub processing: bool,
    pub upload_progress: u8,
    pub error: String,
}

/// Ready-made observer that folds callbacks into a [`StreamSnapshot`].
///
/// The snapshot is owned here, injected into the client rather than living in
/// process-wide state; UI layers read it with [`SnapshotObserver::snapshot`].
#[derive(Default)]
pub struct SnapshotObserver {
    state: Mutex<StreamSnapshot>,
}

impl SnapshotObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current accumulated state.
    pub fn snapshot(&self) -> StreamSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, StreamSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StreamObserver for SnapshotObserver {
    fn on_processing_started(&self) {
        let mut state = self.lock();
        *state = StreamSnapshot {
            processing: true,
            ..StreamSnapshot::default()
        };
    }

    fn on_upload_progress(&self, percent: u8) {
        self.lock().upload_progress = percent;
    }

    fn on_status(&self, update: StatusUpdate) {
        let mut state = self.lock();
        state.phase = update.phase;
        state.message = update.message;
    }

    fn on_card_header(&self, header: CardHeader) {
        let mut state = self.lock();
        state.card.title = Some(header.title);
        state.card.vibe = Some(header.vibe);
        state.card.card_type = Some(header.card_type);
    }

    fn on_summary_bullets(&self, bullets: Vec<String>) {
        self.lock().card.bullets = bullets;
    }

    fn on_recall_anchor(&self, anchor: String) {
        self.lock().card.recall_anchor = Some(anchor);
    }

    fn on_action_item(&self, item: String) {
        self.lock().card.action_item = Some(item);
    }

    fn on_complete(&self, _summary: FinalSummary) {
        let mut state = self.lock();
        state.phase = "complete".to_string();
        state.message = "Processing complete!".to_string();
    }

    fn on_recall_results(&self, payload: serde_json::Value) {
        self.lock().recall_results = Some(payload);
    }

    fn on_error(&self, failure: StreamFailure) {
        let mut state = self.lock();
        state.processing = false;
        state.error = failure.user_message();
    }

    fn on_settled(&self) {
        self.lock().processing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConnectionError;

    #[test]
    fn accumulates_card_fields_across_events() {
        let observer = SnapshotObserver::new();
        observer.on_processing_started();
        observer.on_upload_progress(100);
        observer.on_status(StatusUpdate {
            phase: "generating".into(),
            message: "building card".into(),
        });
        observer.on_card_header(CardHeader {
            title: "Q1 Planning".into(),
            vibe: "focused".into(),
            card_type: "meeting".into(),
        });
        observer.on_summary_bullets(vec!["a".into(), "b".into()]);
        observer.on_recall_anchor("budget review".into());
        observer.on_action_item("send notes".into());

        let snapshot = observer.snapshot();
        assert!(snapshot.processing);
        assert_eq!(snapshot.upload_progress, 100);
        assert_eq!(snapshot.phase, "generating");
        assert_eq!(snapshot.card.title.as_deref(), Some("Q1 Planning"));
        assert_eq!(snapshot.card.bullets.len(), 2);
        assert_eq!(snapshot.card.action_item.as_deref(), Some("send notes"));
    }

    #[test]
    fn complete_then_settled_marks_processing_finished() {
        let observer = SnapshotObserver::new();
        observer.on_processing_started();
        observer.on_complete(FinalSummary::default());
        assert!(observer.snapshot().processing);
        assert_eq!(observer.snapshot().phase, "complete");
        observer.on_settled();
        assert!(!observer.snapshot().processing);
    }

    #[test]
    fn error_stops_processing_with_user_message() {
        let observer = SnapshotObserver::new();
        observer.on_processing_started();
        observer.on_error(StreamFailure::Connection(ConnectionError::handshake(
            404,
            r#"{"detail":"Session not found"}"#,
        )));
        let snapshot = observer.snapshot();
        assert!(!snapshot.processing);
        assert_eq!(snapshot.error, "Session not found");
    }

    #[test]
    fn starting_a_run_clears_previous_state() {
        let observer = SnapshotObserver::new();
        observer.on_error(StreamFailure::Cancelled);
        observer.on_processing_started();
        let snapshot = observer.snapshot();
        assert!(snapshot.processing);
        assert!(snapshot.error.is_empty());
    }
}
