/// Sentinel cursor value for a session that has not seen an id-bearing event.
pub const CURSOR_SENTINEL: &str = "0";

/// Mutable per-session stream state threaded through the reconnect loop.
///
/// Keeping the cursor and retry count here (rather than captured in closures)
/// makes the resume state inspectable and testable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSession {
    /// Server-assigned identifier, immutable for the session's lifetime.
    pub session_id: String,
    /// Id of the most recently delivered event; starts at the `"0"` sentinel.
    pub last_event_id: String,
    /// Consecutive reconnect count; resets only when the session terminates
    /// or is explicitly reset.
    pub retry_count: u32,
    /// Run generation this session belongs to; deliveries from superseded
    /// generations are discarded.
    pub generation: u64,
}

impl StreamSession {
    /// Creates session state for a freshly captured upload.
    pub fn new(session_id: impl Into<String>, generation: u64) -> Self {
        Self {
            session_id: session_id.into(),
            last_event_id: CURSOR_SENTINEL.to_string(),
            retry_count: 0,
            generation,
        }
    }

    /// Advances the cursor with the id carried by a delivered frame.
    ///
    /// Ids are an opaque pass-through: last one wins, empty and absent ids
    /// leave the cursor untouched.
    pub fn observe_event_id(&mut self, id: Option<&str>) {
        if let Some(id) = id
            && !id.is_empty()
        {
            self.last_event_id = id.to_string();
        }
    }

    /// Records a connection fault ahead of a reconnect attempt.
    pub fn record_fault(&mut self) {
        self.retry_count += 1;
    }

    /// Cursor to resume from, or `None` for the initial connection.
    ///
    /// Reconnects always carry the current cursor, even when it is still the
    /// sentinel.
    pub fn resume_cursor(&self) -> Option<&str> {
        (self.retry_count > 0).then_some(self.last_event_id.as_str())
    }
}
