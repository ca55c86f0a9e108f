//! Realtime session client for the bidirectional generative live service.
//!
//! This crate owns the WebSocket lifecycle for one live session: connect
//! with a bounded handshake, transmit the session configuration as the
//! first message, multiplex text turns / realtime audio / tool responses
//! onto the wire, and classify inbound messages into typed events.
//!
//! # Example
//!
//! ```rust,no_run
//! use tutorlive_live::{LiveClient, LiveConfig, LiveEvent, Part};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LiveConfig::new("models/gemini-2.0-flash-exp")
//!         .with_instruction_text("You are a friendly music tutor.");
//!
//!     let client = LiveClient::new("wss://example.test/live?key=...");
//!     let session = client.connect(&config).await?;
//!     let mut events = session.subscribe();
//!
//!     session.send(vec![Part::text("Hello!")], true).await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             LiveEvent::Content(turn) => println!("{:?}", turn),
//!             LiveEvent::TurnComplete => break,
//!             _ => {}
//!         }
//!     }
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! A successful `connect` is the "open" signal: the session value does not
//! exist until the handshake and initial setup message have gone through.
//! There is no automatic reconnection; every connect is a fresh attempt and
//! callers own the retry policy.

pub mod client;
pub mod error;
pub mod event;
pub mod session;
pub mod turn;
pub mod types;
pub mod wire;

pub use client::{exchange_secure_url, LiveClient, DEFAULT_HANDSHAKE_TIMEOUT};
pub use error::{Error, Result};
pub use event::LiveEvent;
pub use session::LiveSession;
pub use turn::{TurnState, TurnTracker};
pub use types::*;
pub use wire::{ClientMessage, ServerContent, ServerMessage};
