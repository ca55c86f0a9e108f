//! Active live session: socket loops, send surface, event bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::{SplitSink, SplitStream, StreamExt};
use futures::SinkExt;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};

use tutorlive_audio::{AudioChunk, PLAYBACK_SAMPLE_RATE};

use crate::error::{Error, Result};
use crate::event::LiveEvent;
use crate::turn::{TurnState, TurnTracker};
use crate::types::{Content, FunctionResponse, LiveConfig, Part};
use crate::wire::{
    parse_server_message, ClientContent, ClientMessage, MediaChunk, RealtimeInput, ServerMessage,
    ToolResponsePayload,
};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const CONTROL_QUEUE: usize = 100;

/// Bounded queue for fire-and-forget media. At one chunk per 128ms this
/// holds roughly eight seconds of audio; a link that far behind real time
/// is already unusable, so the newest chunk is dropped (with a warning)
/// rather than blocking the capture path.
const REALTIME_QUEUE: usize = 64;

const EVENT_BUS_CAPACITY: usize = 256;

/// One live WebSocket session.
///
/// Owns the socket exclusively: a dedicated write task serializes outbound
/// traffic (control messages take priority over realtime audio) and a
/// dedicated read task classifies inbound frames and publishes
/// [`LiveEvent`]s on a broadcast bus in strict arrival order.
///
/// A constructed session is open by definition; `connect` resolving is the
/// "open" signal. After the socket goes away — locally via [`close`] or
/// remotely — every send fails fast with [`Error::NotConnected`] rather
/// than dropping silently.
///
/// [`close`]: LiveSession::close
#[derive(Debug)]
pub struct LiveSession {
    write_tx: mpsc::Sender<Message>,
    realtime_tx: mpsc::Sender<Message>,
    events_tx: broadcast::Sender<LiveEvent>,
    early_rxs: Mutex<Vec<broadcast::Receiver<LiveEvent>>>,
    turns: Arc<Mutex<TurnTracker>>,
    open: Arc<AtomicBool>,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
}

impl LiveSession {
    /// Splits the socket, spawns the I/O loops, and transmits the setup
    /// message — required by the remote protocol to be the first message,
    /// exactly once per connection.
    pub(crate) async fn start(ws: WsStream, config: &LiveConfig) -> Result<Self> {
        let (write, read) = ws.split();

        let (write_tx, write_rx) = mpsc::channel(CONTROL_QUEUE);
        let (realtime_tx, realtime_rx) = mpsc::channel(REALTIME_QUEUE);
        let (events_tx, first_rx) = broadcast::channel(EVENT_BUS_CAPACITY);
        // Receivers created before the read loop spawns, so the first two
        // subscribers (driver pump and transcript recorder) cannot miss
        // events that arrive during session setup.
        let early_rxs = Mutex::new(vec![first_rx, events_tx.subscribe()]);

        let turns = Arc::new(Mutex::new(TurnTracker::new()));
        let open = Arc::new(AtomicBool::new(true));

        let write_handle = tokio::spawn(write_loop(write, write_rx, realtime_rx));
        let read_handle = tokio::spawn(read_loop(
            read,
            events_tx.clone(),
            turns.clone(),
            open.clone(),
        ));

        let session = Self {
            write_tx,
            realtime_tx,
            events_tx,
            early_rxs,
            turns,
            open,
            _read_handle: read_handle,
            _write_handle: write_handle,
        };

        session
            .send_message(ClientMessage::Setup(config.clone()))
            .await?;
        Ok(session)
    }

    /// Returns a receiver over the session's events.
    ///
    /// The first two calls hand out receivers created before inbound
    /// processing began; later subscribers observe from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        if let Some(rx) = self.early_rxs.lock().unwrap().pop() {
            rx
        } else {
            self.events_tx.subscribe()
        }
    }

    /// True while the socket is up.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Current turn-lifecycle state.
    pub fn turn_state(&self) -> TurnState {
        self.turns.lock().unwrap().state()
    }

    /// IDs of tool calls still awaiting a response.
    pub fn pending_tool_calls(&self) -> Vec<String> {
        self.turns.lock().unwrap().pending_tool_calls().to_vec()
    }

    /// Transmits a structured user turn and notifies observers.
    pub async fn send(&self, parts: Vec<Part>, turn_complete: bool) -> Result<()> {
        self.ensure_open()?;
        self.turns.lock().unwrap().on_user_turn(turn_complete);

        let message = ClientMessage::ClientContent(ClientContent {
            turns: vec![Content::user(parts.clone())],
            turn_complete,
        });
        self.send_message(message).await?;

        // Synchronous observer notification; the transcript recorder hangs
        // off this instead of wrapping the send path.
        let _ = self.events_tx.send(LiveEvent::OutboundTurn(parts));
        Ok(())
    }

    /// Queues a realtime audio chunk. Never blocks: when the bounded queue
    /// is full the chunk is dropped with a warning.
    pub fn send_realtime(&self, chunk: &AudioChunk) -> Result<()> {
        self.ensure_open()?;
        let message = ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type: chunk.mime_type(),
                data: chunk.to_base64(),
            }],
        });
        let text = serde_json::to_string(&message)?;
        match self.realtime_tx.try_send(Message::Text(text.into())) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("realtime send queue full; dropping audio chunk");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::SessionClosed),
        }
    }

    /// Sends responses for outstanding tool calls. A response whose ID
    /// matches no outstanding call is still transmitted but logged.
    pub async fn send_tool_response(&self, responses: Vec<FunctionResponse>) -> Result<()> {
        self.ensure_open()?;
        {
            let mut turns = self.turns.lock().unwrap();
            for response in &responses {
                if !turns.on_tool_response(&response.id) {
                    warn!(
                        id = %response.id,
                        "tool response does not match an outstanding call"
                    );
                }
            }
        }
        self.send_message(ClientMessage::ToolResponse(ToolResponsePayload {
            function_responses: responses,
        }))
        .await
    }

    /// Closes the connection. Idempotent; safe to call after the socket has
    /// already gone away.
    pub async fn close(&self) -> Result<()> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.write_tx.send(Message::Close(None)).await;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    async fn send_message(&self, message: ClientMessage) -> Result<()> {
        let text = serde_json::to_string(&message)?;
        debug!("sending: {}", truncate_for_log(&text, 500));
        self.write_tx
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| Error::SessionClosed)
    }
}

// Write loop task. Control messages (setup, turns, tool responses, close)
// take priority over the realtime audio queue.
async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut control_rx: mpsc::Receiver<Message>,
    mut realtime_rx: mpsc::Receiver<Message>,
) {
    let mut realtime_open = true;
    loop {
        tokio::select! {
            biased;
            msg = control_rx.recv() => match msg {
                Some(Message::Close(_)) => {
                    let _ = write.close().await;
                    break;
                }
                Some(msg) => {
                    if let Err(e) = write.send(msg).await {
                        error!("write error: {}", e);
                        break;
                    }
                }
                None => {
                    let _ = write.close().await;
                    break;
                }
            },
            msg = realtime_rx.recv(), if realtime_open => match msg {
                Some(msg) => {
                    if let Err(e) = write.send(msg).await {
                        error!("write error: {}", e);
                        break;
                    }
                }
                None => realtime_open = false,
            },
        }
    }
}

// Read loop task. Frames are processed strictly in arrival order.
async fn read_loop(
    mut read: SplitStream<WsStream>,
    events: broadcast::Sender<LiveEvent>,
    turns: Arc<Mutex<TurnTracker>>,
    open: Arc<AtomicBool>,
) {
    while let Some(result) = read.next().await {
        match result {
            Ok(Message::Text(text)) => handle_frame(text.as_str(), &events, &turns),
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => handle_frame(text, &events, &turns),
                Err(_) => warn!("ignoring non-utf8 binary frame ({} bytes)", data.len()),
            },
            Ok(Message::Close(_)) => {
                debug!("websocket closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("read error: {}", e);
                let _ = events.send(LiveEvent::Error(e.to_string()));
                break;
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    let pending = turns.lock().unwrap().pending_tool_calls().to_vec();
    if !pending.is_empty() {
        warn!(?pending, "session closed with unanswered tool calls");
    }
    let _ = events.send(LiveEvent::Closed);
}

fn handle_frame(text: &str, events: &broadcast::Sender<LiveEvent>, turns: &Mutex<TurnTracker>) {
    debug!("received: {}", truncate_for_log(text, 1000));
    match parse_server_message(text) {
        Ok(message) => dispatch(message, events, turns),
        Err(e) => warn!("undecodable server frame: {}", e),
    }
}

// Expands one classified message into events, updating turn state as it
// goes. Kept free of socket types so the state handling is testable.
fn dispatch(
    message: ServerMessage,
    events: &broadcast::Sender<LiveEvent>,
    turns: &Mutex<TurnTracker>,
) {
    match message {
        ServerMessage::SetupComplete => {
            let _ = events.send(LiveEvent::SetupComplete);
        }
        ServerMessage::Content(content) => {
            if content.interrupted == Some(true) {
                // The rest of a preempted frame is stale; queued playback
                // gets flushed downstream.
                turns.lock().unwrap().on_interrupted();
                let _ = events.send(LiveEvent::Interrupted);
                return;
            }
            if let Some(turn) = content.model_turn {
                let mut text_parts = Vec::new();
                for part in turn.parts {
                    if let Some(blob) = &part.inline_data {
                        if blob.mime_type.starts_with("audio/pcm") {
                            match AudioChunk::from_base64(rate_from_mime(&blob.mime_type), &blob.data)
                            {
                                Ok(chunk) => {
                                    turns.lock().unwrap().on_model_content();
                                    let _ = events.send(LiveEvent::Audio(chunk));
                                }
                                Err(e) => warn!("dropping undecodable audio part: {}", e),
                            }
                            continue;
                        }
                    }
                    if part.text.is_some() {
                        text_parts.push(part);
                    }
                }
                if !text_parts.is_empty() {
                    turns.lock().unwrap().on_model_content();
                    let _ = events.send(LiveEvent::Content(Content::model(text_parts)));
                }
            }
            if content.turn_complete == Some(true) {
                if !turns.lock().unwrap().on_turn_complete() {
                    debug!("turn held open by outstanding tool calls");
                }
                let _ = events.send(LiveEvent::TurnComplete);
            }
        }
        ServerMessage::ToolCall(payload) => {
            turns
                .lock()
                .unwrap()
                .on_tool_call(payload.function_calls.iter().map(|c| c.id.clone()));
            let _ = events.send(LiveEvent::ToolCall(payload.function_calls));
        }
        ServerMessage::ToolCallCancellation(payload) => {
            turns.lock().unwrap().on_tool_call_cancellation(&payload.ids);
            let _ = events.send(LiveEvent::ToolCallCancellation(payload.ids));
        }
        ServerMessage::Unknown => {
            debug!("ignoring unrecognized server message");
        }
    }
}

/// Extracts the sample rate from a mime descriptor like
/// `audio/pcm;rate=24000`, defaulting to the service rate.
fn rate_from_mime(mime: &str) -> u32 {
    mime.split(';')
        .filter_map(|p| p.trim().strip_prefix("rate="))
        .find_map(|r| r.parse().ok())
        .unwrap_or(PLAYBACK_SAMPLE_RATE)
}

fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() > max_len {
        format!("{}...", &s[..max_len])
    } else {
        s.to_string()
    }
}
