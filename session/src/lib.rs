//! Session lifecycle orchestration.
//!
//! A [`Session`] owns everything one connect-to-disconnect lifecycle needs:
//! the live transport, the capture recorder, the playback queue, and the
//! transcript recorder. Sessions are constructed explicitly and passed
//! around by the embedding UI — there is no shared global instance.
//!
//! Teardown contract: [`Session::disconnect`] is idempotent, stops capture
//! before closing the socket, and flushes the transcript exactly once; a
//! network-caused close routes through the same flush guard, so clean and
//! forced teardown are indistinguishable to the sink.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tutorlive_audio::{AudioError, CaptureSource, PlaybackQueue, Recorder, RecorderOptions};
use tutorlive_context::ContextSource;
use tutorlive_live::{
    exchange_secure_url, FunctionResponse, LiveClient, LiveConfig, LiveEvent, LiveSession, Part,
    DEFAULT_HANDSHAKE_TIMEOUT,
};
use tutorlive_transcript::{SessionLog, SinkClient, TranscriptRecorder};

/// Text turn announcing a screen share to the assistant.
const SCREEN_SHARE_NOTICE: &str =
    "I've started sharing my screen. Can you help me with what you see?";

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced to the UI driver.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport or configuration failure; retry is the caller's call.
    #[error(transparent)]
    Live(#[from] tutorlive_live::Error),

    /// Capture device failure; the session does not proceed.
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Endpoints and behavior for one session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Template WebSocket URL (no credentials).
    pub ws_url: String,
    /// Credential proxy endpoint; when set, `ws_url` is exchanged for a
    /// credentialed URL before connecting.
    pub proxy_endpoint: Option<String>,
    /// User-context source endpoint for instruction augmentation.
    pub context_endpoint: Option<String>,
    /// Conversation-log sink endpoint.
    pub sink_endpoint: Option<String>,
    /// Scripted first user turn sent once after connect.
    pub opening_line: Option<String>,
    /// Bound on the WebSocket handshake.
    pub handshake_timeout: Duration,
}

impl SessionOptions {
    /// Creates options for the given endpoint with everything else off.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            proxy_endpoint: None,
            context_endpoint: None,
            sink_endpoint: None,
            opening_line: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

struct Active {
    session_id: String,
    live: Arc<LiveSession>,
    recorder: Arc<TranscriptRecorder>,
    capture: Recorder,
    playback: Arc<PlaybackQueue>,
    pumps: Vec<JoinHandle<()>>,
}

// Capture stops before the socket closes so no stray chunks race the close;
// the flush guard inside the recorder makes this path and the
// network-caused close path add up to exactly one delivery.
async fn teardown(mut active: Active) {
    debug!(session_id = %active.session_id, "disconnecting");

    active.capture.stop();
    let _ = active.live.close().await;
    active.recorder.flush().await;
    active.playback.interrupt();

    for pump in active.pumps {
        if tokio::time::timeout(Duration::from_secs(5), pump).await.is_err() {
            warn!("session pump did not settle during teardown");
        }
    }
}

/// One voice session: configuration plus at most one active connection.
pub struct Session {
    config: LiveConfig,
    opts: SessionOptions,
    http: reqwest::Client,
    active: Mutex<Option<Active>>,
}

impl Session {
    /// Creates a session; nothing connects until [`Session::connect`].
    pub fn new(config: LiveConfig, opts: SessionOptions) -> Self {
        Self {
            config,
            opts,
            http: reqwest::Client::new(),
            active: Mutex::new(None),
        }
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Connects, wiring capture, playback, and the transcript recorder.
    ///
    /// Any prior connection is fully torn down first — capture stopped,
    /// transcript flushed, socket closed — so two sockets never coexist.
    /// Context augmentation failures degrade to the original config;
    /// credential, transport, and capture failures are surfaced and leave
    /// nothing partially open.
    pub async fn connect(&self, microphone: Box<dyn CaptureSource>) -> Result<()> {
        // The slot lock is held for the whole attempt, so concurrent
        // connects serialize and two sockets can never coexist.
        let mut slot = self.active.lock().await;
        if let Some(previous) = slot.take() {
            teardown(previous).await;
        }

        let mut config = self.config.clone();
        if let Some(endpoint) = &self.opts.context_endpoint {
            config = ContextSource::new(endpoint).augment(config).await;
        }

        let url = match &self.opts.proxy_endpoint {
            Some(proxy) => exchange_secure_url(&self.http, proxy, &self.opts.ws_url).await?,
            None => self.opts.ws_url.clone(),
        };

        let client = LiveClient::new(url).with_handshake_timeout(self.opts.handshake_timeout);
        let live = Arc::new(client.connect(&config).await?);

        let session_id = uuid::Uuid::new_v4().to_string();
        let sink = self.opts.sink_endpoint.as_deref().map(SinkClient::new);
        let recorder = Arc::new(TranscriptRecorder::new(
            &session_id,
            &config.user_id,
            &config.username,
            sink,
        ));
        let playback = Arc::new(PlaybackQueue::new());

        // Capture starts before the pumps: a microphone failure means the
        // session does not proceed at all.
        let (chunk_tx, mut chunk_rx) = mpsc::channel(32);
        let mut capture = Recorder::new(RecorderOptions::default());
        if let Err(e) = capture.start(microphone, chunk_tx) {
            let _ = live.close().await;
            return Err(e.into());
        }

        let mut pumps = Vec::new();

        // Inbound events: audio to the playback queue, barge-in flushes it,
        // a close (local or network-caused) flushes the transcript.
        {
            let mut events = live.subscribe();
            let playback = playback.clone();
            let recorder = recorder.clone();
            pumps.push(tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(LiveEvent::Audio(chunk)) => {
                            playback.enqueue(chunk);
                        }
                        Ok(LiveEvent::Interrupted) => playback.interrupt(),
                        Ok(LiveEvent::Error(message)) => {
                            warn!("session transport error: {}", message);
                        }
                        Ok(LiveEvent::Closed) => {
                            recorder.flush().await;
                            break;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "playback pump lagged behind the event bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        // Transcript tap: the recorder observes outbound turns and inbound
        // content over the event bus.
        {
            let mut events = live.subscribe();
            let recorder = recorder.clone();
            pumps.push(tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(LiveEvent::OutboundTurn(parts)) => {
                            let text: String = parts
                                .iter()
                                .filter_map(|p| p.text.as_deref())
                                .collect::<Vec<_>>()
                                .join("");
                            recorder.record_user_text(&text);
                        }
                        Ok(LiveEvent::Content(turn)) => {
                            recorder.record_assistant_text(&turn.text());
                        }
                        Ok(LiveEvent::Audio(_)) => recorder.record_assistant_audio(),
                        Ok(LiveEvent::TurnComplete) => recorder.record_turn_complete(),
                        Ok(LiveEvent::Closed) => break,
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "transcript tap lagged behind the event bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        // Outbound capture pump: chunks go to the wire in arrival order.
        {
            let live = live.clone();
            pumps.push(tokio::spawn(async move {
                while let Some(chunk) = chunk_rx.recv().await {
                    if live.send_realtime(&chunk).is_err() {
                        break;
                    }
                }
            }));
        }

        if let Some(line) = &self.opts.opening_line {
            if let Err(e) = live.send(vec![Part::text(line.clone())], true).await {
                warn!("failed to send opening line: {}", e);
            }
        }

        debug!(%session_id, "session connected");
        *slot = Some(Active {
            session_id,
            live,
            recorder,
            capture,
            playback,
            pumps,
        });
        Ok(())
    }

    /// Tears the session down: capture stopped, socket closed, transcript
    /// flushed. Idempotent — calling when disconnected is a no-op.
    pub async fn disconnect(&self) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        teardown(active).await;
    }

    /// True while the socket is up.
    pub async fn is_connected(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| a.live.is_open())
            .unwrap_or(false)
    }

    /// The identifier assigned at connect time.
    pub async fn session_id(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| a.session_id.clone())
    }

    /// Sends a complete text turn.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let guard = self.active.lock().await;
        let active = guard.as_ref().ok_or(tutorlive_live::Error::NotConnected)?;
        active.live.send(vec![Part::text(text)], true).await?;
        Ok(())
    }

    /// Sends responses for outstanding tool calls.
    pub async fn send_tool_response(&self, responses: Vec<FunctionResponse>) -> Result<()> {
        let guard = self.active.lock().await;
        let active = guard.as_ref().ok_or(tutorlive_live::Error::NotConnected)?;
        active.live.send_tool_response(responses).await?;
        Ok(())
    }

    /// Attaches system audio from a screen share and tells the assistant.
    pub async fn start_screen_share(&self, source: Box<dyn CaptureSource>) -> Result<()> {
        let guard = self.active.lock().await;
        let active = guard.as_ref().ok_or(tutorlive_live::Error::NotConnected)?;
        active.capture.add_source(source)?;
        active
            .live
            .send(vec![Part::text(SCREEN_SHARE_NOTICE)], true)
            .await?;
        Ok(())
    }

    /// Detaches the screen-share audio source.
    pub async fn stop_screen_share(&self) {
        if let Some(active) = self.active.lock().await.as_ref() {
            active.capture.remove_source();
        }
    }

    /// Mutes or unmutes the outbound microphone stream.
    pub async fn set_muted(&self, muted: bool) {
        if let Some(active) = self.active.lock().await.as_ref() {
            active.capture.set_muted(muted);
        }
    }

    /// Microphone volume envelope for UI feedback.
    pub async fn capture_volume(&self) -> f32 {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| a.capture.volume())
            .unwrap_or(0.0)
    }

    /// Screen-share audio volume envelope.
    pub async fn system_volume(&self) -> f32 {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| a.capture.system_volume())
            .unwrap_or(0.0)
    }

    /// Assistant playback volume envelope.
    pub async fn playback_volume(&self) -> f32 {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| a.playback.volume())
            .unwrap_or(0.0)
    }

    /// The playback queue of the active connection, for the output device
    /// pull loop.
    pub async fn playback(&self) -> Option<Arc<PlaybackQueue>> {
        self.active.lock().await.as_ref().map(|a| a.playback.clone())
    }

    /// A copy of the transcript accumulated so far.
    pub async fn transcript(&self) -> Option<SessionLog> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| a.recorder.snapshot())
    }
}
