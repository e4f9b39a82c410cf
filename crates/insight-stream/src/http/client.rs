use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use reqwest::header;
use tracing::debug;

use crate::errors::{ClientError, ConnectionError, UploadError};
use crate::transport::{
    AudioAsset, CaptureResult, EventFrame, EventStreamHandle, IngestTransport, ProgressFn,
};

use super::config::ApiConfig;
use super::sse::SseDecoder;

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Backend transport speaking the capture, stream, and recall endpoints.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpTransport {
    /// Creates a transport from explicit configuration.
    ///
    /// The underlying client carries no default timeout; the configured
    /// timeout is applied per request to bounded calls only, so the event
    /// stream can outlive it.
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::Config(
                "transport config base_url must not be empty".into(),
            ));
        }
        if config.bearer_token.trim().is_empty() {
            return Err(ClientError::Config(
                "transport config bearer_token must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport from `INSIGHT_API_BASE_URL` and `INSIGHT_API_TOKEN`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ApiConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl IngestTransport for HttpTransport {
    async fn upload(
        &self,
        asset: &AudioAsset,
        progress: ProgressFn,
    ) -> Result<CaptureResult, UploadError> {
        let data = tokio::fs::read(&asset.path)
            .await
            .map_err(|e| UploadError::transport(format!("failed to read audio asset: {e}")))?;
        let total = data.len() as u64;
        debug!(
            path = %asset.path.display(),
            size_bytes = total,
            mime_type = %asset.mime_type,
            "uploading audio capture"
        );
        progress(0);

        let body = reqwest::Body::wrap_stream(progress_chunks(bytes::Bytes::from(data), progress));
        let part = reqwest::multipart::Part::stream_with_length(body, total)
            .file_name(asset.file_name.clone())
            .mime_str(&asset.mime_type)
            .map_err(|e| UploadError::transport(format!("invalid mime type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.config.capture_url())
            .bearer_auth(&self.config.bearer_token)
            .timeout(self.config.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::transport(format!("capture request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(UploadError::status(status.as_u16(), body));
        }

        let capture: CaptureResult = response
            .json()
            .await
            .map_err(|e| UploadError::invalid(format!("malformed capture response: {e}")))?;
        if capture.session_id.trim().is_empty() {
            return Err(UploadError::invalid("capture response missing session_id"));
        }
        Ok(capture)
    }

    async fn open_stream(
        &self,
        session_id: &str,
        last_event_id: Option<&str>,
    ) -> Result<EventStreamHandle, ConnectionError> {
        let url = self.config.stream_url(session_id, last_event_id);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.bearer_token)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ConnectionError::transport(format!("stream request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ConnectionError::handshake(status.as_u16(), body));
        }

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(EventStreamHandle {
            frames: Box::pin(frame_stream(bytes_stream)),
        })
    }

    async fn recall(
        &self,
        anchor_text: &str,
        session_id: &str,
    ) -> Result<serde_json::Value, ConnectionError> {
        let response = self
            .client
            .get(self.config.recall_url())
            .query(&[("q", anchor_text), ("session_id", session_id)])
            .bearer_auth(&self.config.bearer_token)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| ConnectionError::transport(format!("recall request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ConnectionError::handshake(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| ConnectionError::transport(format!("malformed recall response: {e}")))
    }
}

/// Splits an in-memory body into fixed chunks, reporting percent progress as
/// each chunk is pulled by the HTTP client.
fn progress_chunks(
    data: bytes::Bytes,
    progress: ProgressFn,
) -> impl futures::Stream<Item = Result<bytes::Bytes, std::io::Error>> + Send + 'static {
    let total = (data.len() as u64).max(1);
    stream::unfold(
        (data, 0u64, progress),
        move |(mut data, sent, progress)| async move {
            if data.is_empty() {
                return None;
            }
            let take = data.len().min(UPLOAD_CHUNK_BYTES);
            let chunk = data.split_to(take);
            let sent = sent + take as u64;
            let percent = ((sent * 100) / total).min(100) as u8;
            progress(percent);
            Some((Ok(chunk), (data, sent, progress)))
        },
    )
}

/// Adapts the raw byte stream into decoded event frames.
///
/// Frames without an event name are keep-alives and are dropped here; cursor
/// tracking happens above this layer, so only named frames matter.
fn frame_stream(
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<EventFrame, ConnectionError>> + Send + 'static {
    struct State {
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<EventFrame>,
        done: bool,
    }

    stream::try_unfold(
        State {
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(frame) = state.pending.pop_front() {
                    return Ok(Some((frame, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            let Some(name) = frame.event else { continue };
                            state.pending.push_back(EventFrame {
                                name,
                                id: frame.id,
                                data: frame.data,
                            });
                        }
                        continue;
                    }
                    Some(Err(e)) => {
                        return Err(ConnectionError::transport(format!(
                            "stream read failed: {e}"
                        )));
                    }
                    None => {
                        state.done = true;
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn progress_chunks_reports_monotonic_percentages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let progress: ProgressFn = {
            let seen = seen.clone();
            Arc::new(move |percent| seen.lock().unwrap().push(percent))
        };

        let data = bytes::Bytes::from(vec![0u8; UPLOAD_CHUNK_BYTES * 2 + 512]);
        let chunks: Vec<_> = progress_chunks(data, progress).collect().await;

        assert_eq!(chunks.len(), 3);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(*seen.last().unwrap(), 100);
    }

    #[tokio::test]
    async fn frame_stream_decodes_named_frames_and_skips_keep_alives() {
        let chunks: Vec<Result<bytes::Bytes, reqwest::Error>> = vec![
            Ok(bytes::Bytes::from_static(b"event: status\nid: 1\ndata: {\"phase\":\"p\"}\n\n")),
            Ok(bytes::Bytes::from_static(b": keep-alive\n\nid: 2\ndata: ping\n\n")),
            Ok(bytes::Bytes::from_static(b"event: final\ndata: {}\n\n")),
        ];
        let bytes_stream: ByteStream = Box::pin(stream::iter(chunks));

        let frames: Vec<_> = frame_stream(bytes_stream)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .expect("frames");

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].name, "status");
        assert_eq!(frames[0].id.as_deref(), Some("1"));
        assert_eq!(frames[1].name, "final");
        assert_eq!(frames[1].id, None);
    }

    #[tokio::test]
    async fn frame_stream_reassembles_frames_across_chunks() {
        let chunks: Vec<Result<bytes::Bytes, reqwest::Error>> = vec![
            Ok(bytes::Bytes::from_static(b"event: card_header\nid: 4\nda")),
            Ok(bytes::Bytes::from_static(b"ta: {\"title\":\"T\"}\n\n")),
        ];
        let bytes_stream: ByteStream = Box::pin(stream::iter(chunks));

        let frames: Vec<_> = frame_stream(bytes_stream)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .expect("frames");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name, "card_header");
        assert_eq!(frames[0].data, r#"{"title":"T"}"#);
    }

    #[test]
    fn transport_rejects_empty_credentials() {
        let result = HttpTransport::new(ApiConfig::new("http://localhost:8000", " "));
        assert!(matches!(result, Err(ClientError::Config(_))));
        let result = HttpTransport::new(ApiConfig::new("", "token"));
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
