use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::registry::SessionRegistry;
use super::state::{PublicState, SessionState};
use super::stats::SessionStats;
use super::transcript::Transcript;
use crate::audio::backend::{CaptureDevice, CaptureSource};
use crate::audio::capture::{CaptureAdapter, CaptureEvent};
use crate::channel::messages::{parse_status_reason, ConfigFrame, ResultFrame, NORMAL_CLOSE_CODE};
use crate::channel::{ChannelConnector, ChannelEvent, ChannelSink, OutboundFrame};
use crate::error::{AsrError, AsrErrorKind, SessionError};

type StartedCallback = Box<dyn FnMut() + Send>;
type PartialResultCallback = Box<dyn FnMut(&Transcript) + Send>;
type FinishedCallback = Box<dyn FnMut() + Send>;
type ErrorCallback = Box<dyn FnMut(&AsrError) + Send>;

#[derive(Default)]
struct Callbacks {
    started: Option<StartedCallback>,
    partial_result: Option<PartialResultCallback>,
    finished: Option<FinishedCallback>,
    error: Option<ErrorCallback>,
}

/// Everything that can advance the session lifecycle, delivered over one
/// ordered queue and handled run-to-completion by the driver task.
enum Event {
    CaptureAcquired(Box<dyn CaptureDevice>),
    CaptureDenied(String),
    ChannelConnected(Box<dyn ChannelSink>, mpsc::Receiver<ChannelEvent>),
    ChannelFailed(String),
    Channel(ChannelEvent),
    Capture(CaptureEvent),
    Stop,
    Cancel,
    EarlyStopComplete,
}

struct Shared {
    state: Mutex<SessionState>,
    transcript: Arc<Mutex<Transcript>>,
    stats: Mutex<SessionStats>,
}

/// A live transcription session.
///
/// Coordinates one capture pipeline and one transcription channel:
/// `start()` requests capture access, opens the channel, streams encoded
/// audio chunks, and merges result frames into the transcript until the
/// session reaches exactly one terminal state (finished, error, or
/// canceled). Configuration setters and callback registration must happen
/// before `start()`.
///
/// At most one session may be active per process (per registry).
pub struct Session {
    source: Arc<dyn CaptureSource>,
    connector: Arc<dyn ChannelConnector>,
    registry: Arc<SessionRegistry>,
    shared: Arc<Shared>,
    config: SessionConfig,
    callbacks: Option<Callbacks>,
    cmd_tx: Option<mpsc::Sender<Event>>,
}

impl Session {
    pub fn new(source: Arc<dyn CaptureSource>, connector: Arc<dyn ChannelConnector>) -> Self {
        Self::with_registry(source, connector, SessionRegistry::global())
    }

    /// Construct against a private registry (tests run sessions
    /// concurrently this way).
    pub fn with_registry(
        source: Arc<dyn CaptureSource>,
        connector: Arc<dyn ChannelConnector>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            source,
            connector,
            registry,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::Init),
                transcript: Arc::new(Mutex::new(Transcript::default())),
                stats: Mutex::new(SessionStats::default()),
            }),
            config: SessionConfig::default(),
            callbacks: Some(Callbacks::default()),
            cmd_tx: None,
        }
    }

    fn ensure_not_started(&self) -> Result<(), SessionError> {
        if self.cmd_tx.is_some() {
            return Err(SessionError::SetterAfterStart);
        }
        Ok(())
    }

    fn callbacks_mut(&mut self) -> &mut Callbacks {
        // Callbacks are only taken by start(), which the setters guard
        // against, so the slot is always occupied here.
        self.callbacks.get_or_insert_with(Callbacks::default)
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_not_started()?;
        self.config.api_key = api_key.into();
        Ok(())
    }

    pub fn set_channel_url(&mut self, url: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_not_started()?;
        self.config.channel_url = url.into();
        Ok(())
    }

    pub fn set_include_nonfinal(&mut self, include: bool) -> Result<(), SessionError> {
        self.ensure_not_started()?;
        self.config.include_nonfinal = include;
        Ok(())
    }

    pub fn set_speech_context(&mut self, context: serde_json::Value) -> Result<(), SessionError> {
        self.ensure_not_started()?;
        self.config.speech_context = context;
        Ok(())
    }

    pub fn set_timeslice(&mut self, timeslice: Duration) -> Result<(), SessionError> {
        self.ensure_not_started()?;
        self.config.timeslice = timeslice;
        Ok(())
    }

    pub fn set_max_chunk_bytes(&mut self, max_chunk_bytes: usize) -> Result<(), SessionError> {
        self.ensure_not_started()?;
        self.config.max_chunk_bytes = max_chunk_bytes;
        Ok(())
    }

    pub fn on_started(&mut self, f: impl FnMut() + Send + 'static) -> Result<(), SessionError> {
        self.ensure_not_started()?;
        self.callbacks_mut().started = Some(Box::new(f));
        Ok(())
    }

    pub fn on_partial_result(
        &mut self,
        f: impl FnMut(&Transcript) + Send + 'static,
    ) -> Result<(), SessionError> {
        self.ensure_not_started()?;
        self.callbacks_mut().partial_result = Some(Box::new(f));
        Ok(())
    }

    pub fn on_finished(&mut self, f: impl FnMut() + Send + 'static) -> Result<(), SessionError> {
        self.ensure_not_started()?;
        self.callbacks_mut().finished = Some(Box::new(f));
        Ok(())
    }

    pub fn on_error(
        &mut self,
        f: impl FnMut(&AsrError) + Send + 'static,
    ) -> Result<(), SessionError> {
        self.ensure_not_started()?;
        self.callbacks_mut().error = Some(Box::new(f));
        Ok(())
    }

    /// Begin the session: claim the active slot and request capture
    /// access. Fails on a second call, when another session is active,
    /// or when no channel URL has been configured.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.cmd_tx.is_some() {
            return Err(SessionError::AlreadyStarted);
        }
        if self.config.channel_url.is_empty() {
            return Err(SessionError::MissingChannelUrl);
        }
        self.registry.acquire()?;

        *self.shared.state.lock() = SessionState::RequestingCapture;

        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        self.cmd_tx = Some(cmd_tx.clone());

        info!(session_id = %self.config.session_id, "Session starting");

        let source = Arc::clone(&self.source);
        let acquire_tx = cmd_tx.clone();
        tokio::spawn(async move {
            let event = match source.acquire().await {
                Ok(device) => Event::CaptureAcquired(device),
                Err(e) => Event::CaptureDenied(e.to_string()),
            };
            let _ = acquire_tx.send(event).await;
        });

        let driver = Driver {
            shared: Arc::clone(&self.shared),
            registry: Arc::clone(&self.registry),
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
            callbacks: self.callbacks.take().unwrap_or_default(),
            cmd_tx,
            device: None,
            capture: None,
            sink: None,
            forwarders: Vec::new(),
        };
        tokio::spawn(driver.run(cmd_rx));

        Ok(())
    }

    /// Request a graceful stop.
    ///
    /// While starting, tears down immediately and completes through the
    /// event queue (the finished callback fires after this returns).
    /// While running, signals end of audio and awaits the service's
    /// graceful close. Swallowed while already finishing; an error when
    /// the session is inactive.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let tx = self.cmd_tx.as_ref().ok_or(SessionError::NotActive)?;
        if self.shared.state.lock().is_terminal() {
            return Err(SessionError::NotActive);
        }
        tx.send(Event::Stop)
            .await
            .map_err(|_| SessionError::NotActive)
    }

    /// Abort the session immediately, releasing capture and channel
    /// resources without waiting for acknowledgment. Idempotent; a no-op
    /// once the session is inactive. Invokes no callback.
    pub async fn cancel(&self) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(Event::Cancel).await;
        }
    }

    /// Current lifecycle state, in its user-facing form.
    pub fn state(&self) -> PublicState {
        (*self.shared.state.lock()).into()
    }

    /// Handle to the live transcript. The driver mutates it as result
    /// frames arrive; use [`Session::transcript_snapshot`] for an
    /// immutable copy.
    pub fn transcript(&self) -> Arc<Mutex<Transcript>> {
        Arc::clone(&self.shared.transcript)
    }

    /// Deep copy of the transcript at this moment.
    pub fn transcript_snapshot(&self) -> Transcript {
        self.shared.transcript.lock().clone()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.stats.lock().clone()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(tx) = &self.cmd_tx {
            if !self.shared.state.lock().is_terminal() {
                let _ = tx.try_send(Event::Cancel);
            }
        }
    }
}

/// Owns the session lifecycle. Runs on its own task; every trigger
/// arrives as an [`Event`] and is handled to completion before the next.
struct Driver {
    shared: Arc<Shared>,
    registry: Arc<SessionRegistry>,
    connector: Arc<dyn ChannelConnector>,
    config: SessionConfig,
    callbacks: Callbacks,
    cmd_tx: mpsc::Sender<Event>,
    device: Option<Box<dyn CaptureDevice>>,
    capture: Option<CaptureAdapter>,
    sink: Option<Box<dyn ChannelSink>>,
    forwarders: Vec<JoinHandle<()>>,
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::Receiver<Event>) {
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
            if self.state().is_terminal() {
                break;
            }
        }
    }

    fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    fn set_state(&self, state: SessionState) {
        debug!(?state, "State transition");
        *self.shared.state.lock() = state;
    }

    async fn handle(&mut self, event: Event) {
        match event {
            Event::CaptureAcquired(device) => self.on_capture_acquired(device).await,
            Event::CaptureDenied(message) => self.on_capture_denied(message).await,
            Event::ChannelConnected(sink, events) => {
                self.on_channel_connected(sink, events).await
            }
            Event::ChannelFailed(message) => self.on_channel_failed(message).await,
            Event::Channel(event) => self.on_channel_event(event).await,
            Event::Capture(event) => self.on_capture_event(event).await,
            Event::Stop => self.on_stop().await,
            Event::Cancel => self.on_cancel().await,
            Event::EarlyStopComplete => self.on_early_stop_complete().await,
        }
    }

    async fn on_capture_acquired(&mut self, device: Box<dyn CaptureDevice>) {
        if self.state() != SessionState::RequestingCapture {
            // Stale grant: stop()/cancel() raced ahead. Dropping releases.
            debug!("Discarding stale capture grant");
            drop(device);
            return;
        }

        self.device = Some(device);
        self.set_state(SessionState::OpeningChannel);

        let connector = Arc::clone(&self.connector);
        let url = self.config.channel_url.clone();
        let tx = self.cmd_tx.clone();
        self.forwarders.push(tokio::spawn(async move {
            let event = match connector.connect(&url).await {
                Ok((sink, events)) => Event::ChannelConnected(sink, events),
                Err(e) => Event::ChannelFailed(e.to_string()),
            };
            let _ = tx.send(event).await;
        }));
    }

    async fn on_capture_denied(&mut self, message: String) {
        if self.state() != SessionState::RequestingCapture {
            debug!("Discarding stale capture denial");
            return;
        }
        self.fail(AsrErrorKind::GetUserMediaFailed, message).await;
    }

    async fn on_channel_connected(
        &mut self,
        mut sink: Box<dyn ChannelSink>,
        mut events: mpsc::Receiver<ChannelEvent>,
    ) {
        if self.state() != SessionState::OpeningChannel {
            // Stale connect: close the channel we no longer want.
            debug!("Closing stale channel connection");
            sink.close().await;
            return;
        }

        self.sink = Some(sink);

        let tx = self.cmd_tx.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send(Event::Channel(event)).await.is_err() {
                    break;
                }
            }
        }));

        let Some(device) = self.device.take() else {
            self.fail(AsrErrorKind::GetUserMediaFailed, "capture device lost")
                .await;
            return;
        };

        match CaptureAdapter::start(device, self.config.timeslice, self.config.max_chunk_bytes)
            .await
        {
            Ok((adapter, mut capture_events)) => {
                let sample_rate_hertz = adapter.sample_rate().round() as u32;
                self.capture = Some(adapter);

                let tx = self.cmd_tx.clone();
                self.forwarders.push(tokio::spawn(async move {
                    while let Some(event) = capture_events.recv().await {
                        if tx.send(Event::Capture(event)).await.is_err() {
                            break;
                        }
                    }
                }));

                self.set_state(SessionState::Running);
                self.shared.stats.lock().started_at = Some(Utc::now());

                let frame = ConfigFrame {
                    api_key: self.config.api_key.clone(),
                    sample_rate_hertz,
                    include_nonfinal: self.config.include_nonfinal,
                    speech_context: self.config.speech_context.clone(),
                };
                let payload = match serde_json::to_string(&frame) {
                    Ok(payload) => payload,
                    Err(e) => {
                        self.fail(
                            AsrErrorKind::OtherAsrError,
                            format!("failed to encode configuration frame: {e}"),
                        )
                        .await;
                        return;
                    }
                };
                if let Err(e) = self.send_frame(OutboundFrame::Text(payload)).await {
                    self.fail(
                        AsrErrorKind::WebsocketError,
                        format!("failed to send configuration frame: {e}"),
                    )
                    .await;
                    return;
                }

                info!(
                    session_id = %self.config.session_id,
                    sample_rate_hertz,
                    "Session running"
                );

                if let Some(cb) = &mut self.callbacks.started {
                    cb();
                }
            }
            Err(e) => {
                self.fail(
                    AsrErrorKind::GetUserMediaFailed,
                    format!("failed to start capture: {e}"),
                )
                .await;
            }
        }
    }

    async fn on_channel_failed(&mut self, message: String) {
        if self.state() != SessionState::OpeningChannel {
            debug!("Discarding stale channel failure");
            return;
        }
        self.fail(AsrErrorKind::WebsocketError, message).await;
    }

    async fn on_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Data(chunk) => {
                if self.state() != SessionState::Running {
                    return;
                }
                let len = chunk.len();
                match self.send_frame(OutboundFrame::Binary(chunk)).await {
                    Ok(()) => {
                        let mut stats = self.shared.stats.lock();
                        stats.chunks_sent += 1;
                        stats.bytes_sent += len as u64;
                    }
                    Err(e) => {
                        self.fail(
                            AsrErrorKind::WebsocketError,
                            format!("failed to send audio chunk: {e}"),
                        )
                        .await;
                    }
                }
            }
            CaptureEvent::Stopped => {
                if self.state() != SessionState::Running {
                    return;
                }
                // Capture ended on its own; signal end of audio and await
                // the service's graceful close.
                self.release_capture();
                if let Err(e) = self.send_frame(OutboundFrame::Binary(Vec::new())).await {
                    self.fail(
                        AsrErrorKind::WebsocketError,
                        format!("failed to send end-of-audio frame: {e}"),
                    )
                    .await;
                    return;
                }
                self.set_state(SessionState::Finishing);
                info!("End of audio signaled");
            }
        }
    }

    async fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message(text) => {
                if !matches!(
                    self.state(),
                    SessionState::Running | SessionState::Finishing
                ) {
                    return;
                }
                match serde_json::from_str::<ResultFrame>(&text) {
                    Ok(frame) => {
                        let snapshot = {
                            let mut transcript = self.shared.transcript.lock();
                            transcript.merge(&frame);
                            transcript.clone()
                        };
                        self.shared.stats.lock().results_received += 1;
                        if let Some(cb) = &mut self.callbacks.partial_result {
                            cb(&snapshot);
                        }
                    }
                    Err(e) => warn!(error = %e, "Ignoring malformed result frame"),
                }
            }
            ChannelEvent::Closed { code, reason } => self.on_channel_closed(code, reason).await,
            ChannelEvent::Error(message) => {
                if matches!(
                    self.state(),
                    SessionState::Running | SessionState::Finishing
                ) {
                    self.fail(AsrErrorKind::WebsocketError, message).await;
                }
            }
        }
    }

    async fn on_channel_closed(&mut self, code: u16, reason: String) {
        let state = self.state();
        if !matches!(state, SessionState::Running | SessionState::Finishing) {
            return;
        }

        if code != NORMAL_CLOSE_CODE {
            self.fail(
                AsrErrorKind::WebsocketClosed,
                format!("WebSocket closed with code {code}: {reason}"),
            )
            .await;
            return;
        }

        let token = parse_status_reason(&reason).map(|(token, _)| token.to_string());
        match token.as_deref() {
            Some("eof") if state == SessionState::Finishing => self.finish().await,
            Some("eof") => {
                self.fail(AsrErrorKind::OtherAsrError, "Unexpected EOF received")
                    .await
            }
            _ => self.fail(AsrErrorKind::OtherAsrError, reason).await,
        }
    }

    async fn on_stop(&mut self) {
        match self.state() {
            SessionState::RequestingCapture | SessionState::OpeningChannel => {
                self.release_resources().await;
                self.set_state(SessionState::FinishingEarly);
                // Completion goes back through the queue so the finished
                // callback fires strictly after stop() has returned.
                let tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(Event::EarlyStopComplete).await;
                });
            }
            SessionState::Running => {
                self.release_capture();
                if let Err(e) = self.send_frame(OutboundFrame::Binary(Vec::new())).await {
                    self.fail(
                        AsrErrorKind::WebsocketError,
                        format!("failed to send end-of-audio frame: {e}"),
                    )
                    .await;
                    return;
                }
                self.set_state(SessionState::Finishing);
                info!("End of audio signaled");
            }
            // Already finishing: swallowed.
            _ => {}
        }
    }

    async fn on_cancel(&mut self) {
        if self.state().is_terminal() {
            return;
        }
        info!(session_id = %self.config.session_id, "Session canceled");
        self.release_resources().await;
        self.registry.release();
        self.set_state(SessionState::Canceled);
    }

    async fn on_early_stop_complete(&mut self) {
        // A cancel may have raced ahead of the deferred completion.
        if self.state() == SessionState::FinishingEarly {
            self.finish().await;
        }
    }

    async fn send_frame(&mut self, frame: OutboundFrame) -> anyhow::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.send(frame).await,
            None => anyhow::bail!("channel is not open"),
        }
    }

    fn release_capture(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.terminate();
        }
        // A device acquired but not yet streaming is released by dropping.
        self.device = None;
    }

    async fn release_channel(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.close().await;
        }
    }

    async fn release_resources(&mut self) {
        self.release_capture();
        self.release_channel().await;
        for task in self.forwarders.drain(..) {
            task.abort();
        }
    }

    async fn fail(&mut self, kind: AsrErrorKind, message: impl Into<String>) {
        let err = AsrError::new(kind, message);
        error!(session_id = %self.config.session_id, %err, "Session failed");
        self.release_resources().await;
        self.registry.release();
        self.set_state(SessionState::Error);
        if let Some(cb) = &mut self.callbacks.error {
            cb(&err);
        }
    }

    async fn finish(&mut self) {
        self.release_resources().await;
        self.registry.release();
        self.set_state(SessionState::Finished);
        info!(session_id = %self.config.session_id, "Session finished");
        if let Some(cb) = &mut self.callbacks.finished {
            cb();
        }
    }
}
