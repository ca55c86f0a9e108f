//! Error types for the audio pipeline.

use thiserror::Error;

/// Result type for audio operations.
pub type Result<T> = std::result::Result<T, AudioError>;

/// Errors that can occur in the capture/playback pipeline.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No capture device exists.
    #[error("no audio input device available")]
    NoDevice,

    /// The user denied access to the capture device.
    #[error("audio input permission denied")]
    PermissionDenied,

    /// The capture source failed while reading.
    #[error("capture source error: {0}")]
    Source(String),

    /// A recorder is already capturing.
    #[error("recorder is already running")]
    AlreadyRunning,
}
