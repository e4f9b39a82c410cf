use tracing::{debug, warn};

/// `status` payload: coarse progress reporting for the generation pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub message: String,
}

/// `card_header` payload: the first structured fields of an insight card.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CardHeader {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub vibe: String,
    #[serde(default)]
    pub card_type: String,
}

/// `final` payload: server summary sent when insight generation completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FinalSummary {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub processing_time_ms: u64,
}

/// Typed stream events, one variant per wire event name.
///
/// The enum is intentionally closed: dispatch sites match exhaustively so an
/// added event kind is a compile error everywhere it must be handled.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Status(StatusUpdate),
    CardHeader(CardHeader),
    SummaryBullets(Vec<String>),
    RecallAnchor(String),
    ActionItem(String),
    Final(FinalSummary),
    RecallResults(serde_json::Value),
}

impl StreamEvent {
    /// Returns true for events that end the stream's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final(_) | Self::RecallResults(_))
    }

    /// Returns the wire event name for this variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::CardHeader(_) => "card_header",
            Self::SummaryBullets(_) => "summary_bullets",
            Self::RecallAnchor(_) => "recall_anchor",
            Self::ActionItem(_) => "action_item",
            Self::Final(_) => "final",
            Self::RecallResults(_) => "recall_results",
        }
    }
}

/// Parses a raw wire frame into a typed event.
///
/// Safe-parse policy: unknown event names and malformed JSON payloads are
/// logged and dropped (`None`); they must not take the stream down.
/// `recall_anchor` and `action_item` carry raw strings and are never
/// JSON-parsed.
pub(crate) fn parse_event(name: &str, data: &str) -> Option<StreamEvent> {
    match name {
        "status" => parse_json::<StatusUpdate>(name, data).map(StreamEvent::Status),
        "card_header" => parse_json::<CardHeader>(name, data).map(StreamEvent::CardHeader),
        "summary_bullets" => {
            parse_json::<Vec<String>>(name, data).map(StreamEvent::SummaryBullets)
        }
        "recall_anchor" => Some(StreamEvent::RecallAnchor(data.to_string())),
        "action_item" => Some(StreamEvent::ActionItem(data.to_string())),
        "final" => parse_json::<FinalSummary>(name, data).map(StreamEvent::Final),
        "recall_results" => match serde_json::from_str(data) {
            Ok(value) => Some(StreamEvent::RecallResults(value)),
            Err(error) => {
                warn!(event = name, %error, "dropping frame with malformed payload");
                None
            }
        },
        other => {
            debug!(event = other, "ignoring unrecognized event name");
            None
        }
    }
}

fn parse_json<T>(name: &str, data: &str) -> Option<T>
where
    T: Default + serde::de::DeserializeOwned,
{
    if data.trim().is_empty() {
        return Some(T::default());
    }
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(event = name, %error, "dropping frame with malformed payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_and_card_header_payloads() {
        let status = parse_event("status", r#"{"phase":"uploading","message":"working"}"#);
        assert_eq!(
            status,
            Some(StreamEvent::Status(StatusUpdate {
                phase: "uploading".into(),
                message: "working".into(),
            }))
        );

        let header = parse_event(
            "card_header",
            r#"{"title":"Q1 Planning","vibe":"focused","card_type":"meeting"}"#,
        );
        assert_eq!(
            header,
            Some(StreamEvent::CardHeader(CardHeader {
                title: "Q1 Planning".into(),
                vibe: "focused".into(),
                card_type: "meeting".into(),
            }))
        );
    }

    #[test]
    fn parses_summary_bullets_as_string_array() {
        let event = parse_event("summary_bullets", r#"["first","second"]"#);
        assert_eq!(
            event,
            Some(StreamEvent::SummaryBullets(vec![
                "first".into(),
                "second".into()
            ]))
        );
    }

    #[test]
    fn anchor_and_action_item_are_raw_strings() {
        // Payloads that look like broken JSON still pass through untouched.
        let anchor = parse_event("recall_anchor", r#"{"not json"#);
        assert_eq!(
            anchor,
            Some(StreamEvent::RecallAnchor(r#"{"not json"#.into()))
        );
        let action = parse_event("action_item", "schedule follow-up");
        assert_eq!(
            action,
            Some(StreamEvent::ActionItem("schedule follow-up".into()))
        );
    }

    #[test]
    fn parses_final_summary() {
        let event = parse_event(
            "final",
            r#"{"session_id":"abc123","status":"done","processing_time_ms":420}"#,
        );
        let Some(StreamEvent::Final(summary)) = event else {
            panic!("expected final event");
        };
        assert_eq!(summary.session_id, "abc123");
        assert_eq!(summary.status, "done");
        assert_eq!(summary.processing_time_ms, 420);
        assert!(StreamEvent::Final(summary).is_terminal());
    }

    #[test]
    fn malformed_json_payload_is_dropped() {
        assert_eq!(parse_event("summary_bullets", "not json"), None);
        assert_eq!(parse_event("status", "{broken"), None);
        assert_eq!(parse_event("recall_results", "{broken"), None);
    }

    #[test]
    fn empty_json_payload_falls_back_to_default() {
        assert_eq!(
            parse_event("status", ""),
            Some(StreamEvent::Status(StatusUpdate::default()))
        );
        assert_eq!(
            parse_event("summary_bullets", "  "),
            Some(StreamEvent::SummaryBullets(Vec::new()))
        );
    }

    #[test]
    fn unknown_event_names_are_ignored() {
        assert_eq!(parse_event("heartbeat", "{}"), None);
    }

    #[test]
    fn recall_results_is_terminal_with_arbitrary_payload() {
        let event = parse_event("recall_results", r#"{"entries":[{"id":1}]}"#);
        let Some(event) = event else {
            panic!("expected recall_results event");
        };
        assert!(event.is_terminal());
        assert_eq!(event.name(), "recall_results");
    }
}
