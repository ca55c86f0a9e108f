//! Audio capture, mixing, and playback for realtime voice sessions.
//!
//! The capture side pulls float samples from one or two [`CaptureSource`]s
//! (microphone, optionally system audio during a screen share), mixes them,
//! and emits fixed-size 16-bit PCM chunks suitable for streaming to a
//! realtime service. The playback side schedules inbound PCM chunks against
//! a monotonic clock so playback stays gapless under network jitter and can
//! be flushed instantly when the service signals an interruption.
//!
//! The platform audio device layer is deliberately out of scope: sources and
//! the output pull loop are traits, so the crate works the same against a
//! real device callback or a test fixture.

pub mod capture;
pub mod chunk;
pub mod frame;
pub mod meter;
pub mod playback;

mod error;

pub use capture::{CaptureSource, Recorder, RecorderOptions};
pub use chunk::{AudioChunk, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE};
pub use error::{AudioError, Result};
pub use frame::{FrameBuffer, FRAME_SAMPLES};
pub use meter::VolumeMeter;
pub use playback::{AudioClock, PlaybackQueue, SystemClock};
