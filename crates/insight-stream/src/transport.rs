use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::{ConnectionError, UploadError};

/// Callback receiving upload progress as a percentage in `[0, 100]`.
///
/// Values are monotonically non-decreasing, derived from bytes-sent over
/// bytes-expected.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// A readable local audio resource produced by the recording subsystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioAsset {
    /// Creates an asset from a local path, inferring the mime type from the
    /// file extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.m4a".to_string());
        let mime_type = match path.extension().and_then(|ext| ext.to_str()) {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            _ => "audio/mp4",
        }
        .to_string();
        Self {
            path,
            file_name,
            mime_type,
        }
    }

    /// Overrides the inferred mime type.
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

/// Capture endpoint response correlating the uploaded asset with a stream
/// session.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CaptureResult {
    pub session_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub audio_duration_seconds: f64,
    #[serde(default)]
    pub audio_size_bytes: u64,
    #[serde(default)]
    pub message: String,
}

/// Raw wire frame read off the event stream, before typed parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFrame {
    /// Wire event name (`status`, `card_header`, ...).
    pub name: String,
    /// Server-assigned event id used to advance the resume cursor; frames
    /// without an id do not advance it.
    pub id: Option<String>,
    /// Raw payload text.
    pub data: String,
}

/// Open stream connection handle. Dropping it closes the connection.
pub struct EventStreamHandle {
    /// Frames in server-send order; `Err` ends the connection.
    pub frames:
        Pin<Box<dyn futures::Stream<Item = Result<EventFrame, ConnectionError>> + Send + 'static>>,
}

/// Network boundary of the ingestion client.
///
/// The orchestrator and reconnect policy only see this trait, so tests drive
/// them with scripted fakes and the production path plugs in
/// [`crate::http::HttpTransport`].
#[async_trait::async_trait]
pub trait IngestTransport: Send + Sync {
    /// Uploads a recorded audio asset and returns the capture response.
    ///
    /// Resolves exactly once; no retry happens at this layer.
    async fn upload(
        &self,
        asset: &AudioAsset,
        progress: ProgressFn,
    ) -> Result<CaptureResult, UploadError>;

    /// Opens the server-push event stream for a session, optionally resuming
    /// from a last-seen event cursor.
    async fn open_stream(
        &self,
        session_id: &str,
        last_event_id: Option<&str>,
    ) -> Result<EventStreamHandle, ConnectionError>;

    /// Synchronous (non-streaming) recall query for past related entries.
    async fn recall(
        &self,
        anchor_text: &str,
        session_id: &str,
    ) -> Result<serde_json::Value, ConnectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_infers_mime_type_from_extension() {
        assert_eq!(AudioAsset::from_path("note.wav").mime_type, "audio/wav");
        assert_eq!(AudioAsset::from_path("note.mp3").mime_type, "audio/mpeg");
        assert_eq!(AudioAsset::from_path("note.m4a").mime_type, "audio/mp4");
        assert_eq!(AudioAsset::from_path("note.bin").mime_type, "audio/mp4");
    }

    #[test]
    fn asset_keeps_file_name_and_accepts_override() {
        let asset = AudioAsset::from_path("/tmp/captures/note.m4a").mime_type("audio/aac");
        assert_eq!(asset.file_name, "note.m4a");
        assert_eq!(asset.mime_type, "audio/aac");
    }

    #[test]
    fn capture_result_deserializes_wire_shape() {
        let capture: CaptureResult = serde_json::from_str(
            r#"{"session_id":"abc123","status":"accepted","audio_duration_seconds":12.5,"audio_size_bytes":48000,"message":"ok"}"#,
        )
        .expect("capture result");
        assert_eq!(capture.session_id, "abc123");
        assert_eq!(capture.audio_size_bytes, 48_000);
    }
}
