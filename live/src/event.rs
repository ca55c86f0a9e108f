//! Typed events published by a live session.

use tutorlive_audio::AudioChunk;

use crate::types::{Content, FunctionCall, Part};

/// Events delivered on the session's broadcast bus, in wire-arrival order.
///
/// `OutboundTurn` is the observer hook for transcript recording: it is
/// published synchronously whenever the session accepts a structured user
/// turn, so any number of subscribers can watch outbound traffic without
/// wrapping the send path.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// The service acknowledged the setup message.
    SetupComplete,
    /// One inbound audio chunk, already base64-decoded.
    Audio(AudioChunk),
    /// A text-bearing model turn (audio parts stripped out).
    Content(Content),
    /// Function invocations requested by the service.
    ToolCall(Vec<FunctionCall>),
    /// The service withdrew the calls with these IDs.
    ToolCallCancellation(Vec<String>),
    /// The service preempted its response; queued playback must be flushed.
    Interrupted,
    /// The service finished its turn.
    TurnComplete,
    /// A user turn was accepted for transmission.
    OutboundTurn(Vec<Part>),
    /// The transport failed; a `Closed` event follows.
    Error(String),
    /// The connection is gone, whoever initiated it.
    Closed,
}
