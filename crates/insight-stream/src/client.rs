use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{ClientError, ConnectionError, StreamFailure, UploadError};
use crate::event::{StreamEvent, parse_event};
use crate::observer::{StreamObserver, dispatch_event};
use crate::pacing::{Pacer, PacingConfig};
use crate::retry::ReconnectPolicy;
use crate::session::StreamSession;
use crate::transport::{AudioAsset, IngestTransport, ProgressFn};

/// Lifecycle phase of the ingestion pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Uploading,
    Streaming,
    Retrying,
    Complete,
    Errored,
}

/// Terminal result of a processed session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionOutcome {
    /// `final` closed the stream: a generated insight card.
    Insight(crate::event::FinalSummary),
    /// `recall_results` closed the stream: retrieval of past entries.
    Recall(serde_json::Value),
}

/// Handle used to request cancellation of a running session.
///
/// Cancellation closes the connection and invalidates outstanding pacing and
/// reconnect timers; no further observer callbacks fire.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Handle for a session started with [`InsightClient::process`].
pub struct ProcessHandle {
    final_rx: oneshot::Receiver<Result<SessionOutcome, ClientError>>,
    abort_handle: AbortHandle,
}

impl ProcessHandle {
    /// Returns a handle that can cancel the session.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the session's terminal result.
    ///
    /// Resolves when the terminal event arrives; paced observer deliveries
    /// and the settle callback may still be in flight at that point.
    pub async fn finish(self) -> Result<SessionOutcome, ClientError> {
        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Protocol(
                "ingestion task ended without a terminal result".into(),
            )),
        }
    }
}

struct ClientInner {
    transport: Arc<dyn IngestTransport>,
    reconnect: ReconnectPolicy,
    pacing: PacingConfig,
    phase: Mutex<StreamPhase>,
    abort_tx: Mutex<Option<watch::Sender<bool>>>,
    generation: AtomicU64,
}

impl ClientInner {
    fn phase(&self) -> StreamPhase {
        *lock(&self.phase)
    }

    /// Phase writes from a superseded run are discarded.
    fn set_phase_if(&self, generation: u64, next: StreamPhase) {
        if self.generation.load(Ordering::SeqCst) == generation {
            *lock(&self.phase) = next;
        }
    }

    fn is_live(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Orchestrates the end-to-end capture sequence: upload, stream, paced
/// observer delivery, and bounded reconnects.
#[derive(Clone)]
pub struct InsightClient {
    inner: Arc<ClientInner>,
}

impl InsightClient {
    /// Starts a builder for configuring a client.
    pub fn builder() -> InsightClientBuilder {
        InsightClientBuilder::default()
    }

    /// Returns the current pipeline phase.
    pub fn phase(&self) -> StreamPhase {
        self.inner.phase()
    }

    /// Uploads a recorded asset and streams its insight events to `observer`.
    ///
    /// Only one session may be active at a time; a terminated session must be
    /// cleared with [`InsightClient::reset`] before the next call.
    pub fn process(
        &self,
        asset: AudioAsset,
        observer: Arc<dyn StreamObserver>,
    ) -> Result<ProcessHandle, ClientError> {
        let generation = {
            let mut phase = lock(&self.inner.phase);
            match *phase {
                StreamPhase::Idle => {}
                StreamPhase::Complete | StreamPhase::Errored => {
                    return Err(ClientError::Validation(
                        "previous session has terminated; call reset() before processing again"
                            .into(),
                    ));
                }
                StreamPhase::Uploading | StreamPhase::Streaming | StreamPhase::Retrying => {
                    return Err(ClientError::Validation(
                        "a session is already being processed".into(),
                    ));
                }
            }
            *phase = StreamPhase::Uploading;
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let (abort_tx, abort_rx) = watch::channel(false);
        *lock(&self.inner.abort_tx) = Some(abort_tx.clone());
        let (final_tx, final_rx) = oneshot::channel();

        tokio::spawn(run_task(
            self.inner.clone(),
            asset,
            observer,
            generation,
            abort_rx,
            final_tx,
        ));

        Ok(ProcessHandle {
            final_rx,
            abort_handle: AbortHandle { tx: abort_tx },
        })
    }

    /// Clears all session state and returns the client to `Idle`.
    ///
    /// Any open connection is closed, pending pacing deliveries and reconnect
    /// or settle timers are invalidated, and late events from the superseded
    /// run are discarded.
    pub fn reset(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = lock(&self.inner.abort_tx).take() {
            let _ = tx.send(true);
        }
        *lock(&self.inner.phase) = StreamPhase::Idle;
        debug!("stream state reset");
    }

    /// Queries past related entries for a recall anchor.
    pub async fn recall(
        &self,
        anchor_text: &str,
        session_id: &str,
    ) -> Result<serde_json::Value, ClientError> {
        self.inner
            .transport
            .recall(anchor_text, session_id)
            .await
            .map_err(|err| ClientError::Failed(StreamFailure::Connection(err)))
    }
}

/// Builder for [`InsightClient`].
#[derive(Default)]
pub struct InsightClientBuilder {
    transport: Option<Arc<dyn IngestTransport>>,
    reconnect: Option<ReconnectPolicy>,
    pacing: Option<PacingConfig>,
}

impl InsightClientBuilder {
    /// Sets the network transport (required).
    pub fn transport(mut self, transport: Arc<dyn IngestTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Overrides the reconnect policy.
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Overrides callback pacing.
    pub fn pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Validates the configuration and builds the client.
    pub fn build(self) -> Result<InsightClient, ClientError> {
        let transport = self
            .transport
            .ok_or_else(|| ClientError::Config("a transport is required".into()))?;
        Ok(InsightClient {
            inner: Arc::new(ClientInner {
                transport,
                reconnect: self.reconnect.unwrap_or_default(),
                pacing: self.pacing.unwrap_or_default(),
                phase: Mutex::new(StreamPhase::Idle),
                abort_tx: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        })
    }
}

struct Scheduled {
    deadline: Instant,
    delivery: Delivery,
}

enum Delivery {
    Event(StreamEvent),
    Failure(StreamFailure),
}

impl Scheduled {
    fn event(deadline: Instant, event: StreamEvent) -> Self {
        Self {
            deadline,
            delivery: Delivery::Event(event),
        }
    }

    fn failure(failure: StreamFailure) -> Self {
        Self {
            deadline: Instant::now(),
            delivery: Delivery::Failure(failure),
        }
    }
}

/// Resolves once cancellation has been requested; pends forever otherwise.
async fn aborted(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // All abort senders are gone; nothing can cancel this run.
            futures::future::pending::<()>().await;
        }
    }
}

async fn run_task(
    inner: Arc<ClientInner>,
    asset: AudioAsset,
    observer: Arc<dyn StreamObserver>,
    generation: u64,
    mut abort_rx: watch::Receiver<bool>,
    final_tx: oneshot::Sender<Result<SessionOutcome, ClientError>>,
) {
    observer.on_processing_started();

    let progress: ProgressFn = {
        let observer = observer.clone();
        let inner = inner.clone();
        Arc::new(move |percent| {
            if inner.is_live(generation) {
                observer.on_upload_progress(percent);
            }
        })
    };

    let uploaded = tokio::select! {
        _ = aborted(&mut abort_rx) => {
            debug!(generation, "session cancelled during upload");
            inner.set_phase_if(generation, StreamPhase::Idle);
            let _ = final_tx.send(Err(ClientError::Cancelled));
            return;
        }
        result = inner.transport.upload(&asset, progress) => result,
    };

    let capture = match uploaded {
        Ok(capture) if !capture.session_id.trim().is_empty() => capture,
        Ok(_) => {
            let err = UploadError::invalid("capture response missing session_id");
            fail_upload(&inner, observer.as_ref(), generation, final_tx, err);
            return;
        }
        Err(err) => {
            fail_upload(&inner, observer.as_ref(), generation, final_tx, err);
            return;
        }
    };

    debug!(
        session_id = %capture.session_id,
        duration_s = capture.audio_duration_seconds,
        size_bytes = capture.audio_size_bytes,
        "audio captured; opening event stream"
    );

    let mut session = StreamSession::new(capture.session_id, generation);
    let mut pacer = Pacer::new(inner.pacing.interval);
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    tokio::spawn(dispatch_task(
        observer,
        queue_rx,
        abort_rx.clone(),
        inner.pacing.settle_delay,
        generation,
        inner.clone(),
    ));

    let outcome = read_loop(
        &inner,
        &mut session,
        &mut pacer,
        &queue_tx,
        &mut abort_rx,
        generation,
    )
    .await;
    drop(queue_tx);

    match outcome {
        ReadOutcome::Complete(outcome) => {
            inner.set_phase_if(generation, StreamPhase::Complete);
            let _ = final_tx.send(Ok(outcome));
        }
        ReadOutcome::Failed(failure) => {
            inner.set_phase_if(generation, StreamPhase::Errored);
            let _ = final_tx.send(Err(ClientError::Failed(failure)));
        }
        ReadOutcome::Cancelled => {
            debug!(session_id = %session.session_id, "session cancelled");
            inner.set_phase_if(generation, StreamPhase::Idle);
            let _ = final_tx.send(Err(ClientError::Cancelled));
        }
    }
}

fn fail_upload(
    inner: &ClientInner,
    observer: &dyn StreamObserver,
    generation: u64,
    final_tx: oneshot::Sender<Result<SessionOutcome, ClientError>>,
    err: UploadError,
) {
    warn!(error = %err, "audio capture upload failed");
    let failure = StreamFailure::Upload(err);
    inner.set_phase_if(generation, StreamPhase::Errored);
    if inner.is_live(generation) {
        observer.on_error(failure.clone());
    }
    let _ = final_tx.send(Err(ClientError::Failed(failure)));
}

enum ReadOutcome {
    Complete(SessionOutcome),
    Failed(StreamFailure),
    Cancelled,
}

enum RetryDecision {
    Retry,
    GiveUp(StreamFailure),
    Cancelled,
}

async fn read_loop(
    inner: &ClientInner,
    session: &mut StreamSession,
    pacer: &mut Pacer,
    queue: &mpsc::UnboundedSender<Scheduled>,
    abort_rx: &mut watch::Receiver<bool>,
    generation: u64,
) -> ReadOutcome {
    loop {
        let cursor = session.resume_cursor().map(str::to_owned);
        debug!(
            session_id = %session.session_id,
            attempt = session.retry_count + 1,
            cursor = cursor.as_deref().unwrap_or("-"),
            "connecting to event stream"
        );
        let opened = tokio::select! {
            _ = aborted(abort_rx) => return ReadOutcome::Cancelled,
            opened = inner.transport.open_stream(&session.session_id, cursor.as_deref()) => opened,
        };
        let mut handle = match opened {
            Ok(handle) => handle,
            Err(err) => {
                match schedule_retry(inner, session, err, abort_rx, generation).await {
                    RetryDecision::Retry => continue,
                    RetryDecision::GiveUp(failure) => {
                        let _ = queue.send(Scheduled::failure(failure.clone()));
                        return ReadOutcome::Failed(failure);
                    }
                    RetryDecision::Cancelled => return ReadOutcome::Cancelled,
                }
            }
        };
        inner.set_phase_if(generation, StreamPhase::Streaming);

        loop {
            let next = tokio::select! {
                _ = aborted(abort_rx) => return ReadOutcome::Cancelled,
                next = handle.frames.next() => next,
            };
            let fault = match next {
                Some(Ok(frame)) => {
                    session.observe_event_id(frame.id.as_deref());
                    let Some(event) = parse_event(&frame.name, &frame.data) else {
                        continue;
                    };
                    let outcome = match &event {
                        StreamEvent::Final(summary) => {
                            Some(SessionOutcome::Insight(summary.clone()))
                        }
                        StreamEvent::RecallResults(payload) => {
                            Some(SessionOutcome::Recall(payload.clone()))
                        }
                        _ => None,
                    };
                    let deadline = pacer.schedule(Instant::now());
                    if queue.send(Scheduled::event(deadline, event)).is_err() {
                        return ReadOutcome::Cancelled;
                    }
                    match outcome {
                        Some(outcome) => {
                            debug!(
                                session_id = %session.session_id,
                                "terminal event received; closing stream"
                            );
                            return ReadOutcome::Complete(outcome);
                        }
                        None => continue,
                    }
                }
                Some(Err(err)) => err,
                None => ConnectionError::transport("event stream ended before a terminal event"),
            };
            // Dropping `handle` on the way out closes the connection before a
            // replacement is opened.
            match schedule_retry(inner, session, fault, abort_rx, generation).await {
                RetryDecision::Retry => break,
                RetryDecision::GiveUp(failure) => {
                    let _ = queue.send(Scheduled::failure(failure.clone()));
                    return ReadOutcome::Failed(failure);
                }
                RetryDecision::Cancelled => return ReadOutcome::Cancelled,
            }
        }
    }
}

async fn schedule_retry(
    inner: &ClientInner,
    session: &mut StreamSession,
    error: ConnectionError,
    abort_rx: &mut watch::Receiver<bool>,
    generation: u64,
) -> RetryDecision {
    let policy = &inner.reconnect;
    if !policy.is_retryable(&error) {
        warn!(session_id = %session.session_id, error = %error, "non-retryable stream fault");
        return RetryDecision::GiveUp(StreamFailure::Connection(error));
    }
    if !policy.can_retry(session.retry_count) {
        warn!(
            session_id = %session.session_id,
            retries = session.retry_count,
            error = %error,
            "stream retry budget exhausted"
        );
        return RetryDecision::GiveUp(StreamFailure::Connection(error));
    }

    let delay = policy.backoff_duration(session.retry_count);
    session.record_fault();
    inner.set_phase_if(generation, StreamPhase::Retrying);
    debug!(
        session_id = %session.session_id,
        attempt = session.retry_count,
        delay_ms = delay.as_millis() as u64,
        cursor = %session.last_event_id,
        "scheduling stream reconnect"
    );
    tokio::select! {
        _ = aborted(abort_rx) => RetryDecision::Cancelled,
        _ = tokio::time::sleep(delay) => RetryDecision::Retry,
    }
}

/// Single FIFO dispatcher: delivers scheduled items in order once their
/// pacing deadline passes, then runs the settle timer after a `final` event.
async fn dispatch_task(
    observer: Arc<dyn StreamObserver>,
    mut queue: mpsc::UnboundedReceiver<Scheduled>,
    mut abort_rx: watch::Receiver<bool>,
    settle_delay: Duration,
    generation: u64,
    inner: Arc<ClientInner>,
) {
    let mut settle_pending = false;
    loop {
        let next = tokio::select! {
            _ = aborted(&mut abort_rx) => return,
            next = queue.recv() => next,
        };
        let Some(item) = next else { break };
        tokio::select! {
            _ = aborted(&mut abort_rx) => return,
            _ = tokio::time::sleep_until(item.deadline) => {}
        }
        if !inner.is_live(generation) {
            debug!(generation, "dropping delivery for superseded session");
            return;
        }
        match item.delivery {
            Delivery::Event(event) => {
                settle_pending = matches!(event, StreamEvent::Final(_));
                dispatch_event(observer.as_ref(), event);
            }
            Delivery::Failure(failure) => {
                observer.on_error(failure);
                return;
            }
        }
    }

    if settle_pending {
        tokio::select! {
            _ = aborted(&mut abort_rx) => return,
            _ = tokio::time::sleep(settle_delay) => {}
        }
        if inner.is_live(generation) {
            observer.on_settled();
        }
    }
}
