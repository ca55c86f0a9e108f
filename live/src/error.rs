//! Error types for the live session client.

use std::time::Duration;

use thiserror::Error;

/// Result type for live session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur on the live session transport.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration is missing a required field or a collaborator
    /// returned an unusable value (e.g. a non-secure credentialed URL).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Establishing the connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The handshake did not complete within the configured bound.
    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// HTTP error from the credential proxy.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An operation requires an open connection.
    #[error("not connected")]
    NotConnected,

    /// The session is closed.
    #[error("session closed")]
    SessionClosed,
}
