//! Gapless scheduled playback of inbound PCM chunks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::chunk::{AudioChunk, PLAYBACK_SAMPLE_RATE};
use crate::meter::VolumeMeter;

/// A monotonic clock the playback queue schedules against.
///
/// Abstracted so tests can drive time explicitly; production uses
/// [`SystemClock`].
pub trait AudioClock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

/// Wall clock anchored at construction time.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A chunk with its assigned start time.
#[derive(Debug, Clone)]
pub struct ScheduledChunk {
    /// Start time on the queue's clock.
    pub start: Duration,
    /// The audio payload.
    pub chunk: AudioChunk,
}

struct QueueState {
    cursor: Duration,
    queue: VecDeque<ScheduledChunk>,
}

/// Schedules inbound chunks back-to-back on a dedicated clock.
///
/// Each enqueued chunk starts exactly when the previous one ends, or
/// immediately if the cursor has fallen behind the clock, so playback is
/// gapless regardless of network jitter. [`PlaybackQueue::interrupt`] drops
/// everything not yet started and resets the cursor to now, which is what
/// the service's barge-in signal requires.
///
/// The platform output device drains the queue via
/// [`PlaybackQueue::take_due`].
pub struct PlaybackQueue {
    clock: Arc<dyn AudioClock>,
    sample_rate: u32,
    state: Mutex<QueueState>,
    meter: VolumeMeter,
}

impl PlaybackQueue {
    /// Creates a queue on the system clock at the service sample rate.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()), PLAYBACK_SAMPLE_RATE)
    }

    /// Creates a queue with an explicit clock and sample rate.
    pub fn with_clock(clock: Arc<dyn AudioClock>, sample_rate: u32) -> Self {
        Self {
            clock,
            sample_rate,
            state: Mutex::new(QueueState {
                cursor: Duration::ZERO,
                queue: VecDeque::new(),
            }),
            meter: VolumeMeter::new(),
        }
    }

    /// Schedules a chunk and returns its assigned start time.
    pub fn enqueue(&self, chunk: AudioChunk) -> Duration {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();

        let start = state.cursor.max(now);
        let duration = chunk.duration();
        state.cursor = start + duration;

        let floats: Vec<f32> = chunk
            .samples()
            .iter()
            .map(|&s| s as f32 / 32768.0)
            .collect();
        self.meter.update(&floats);

        state.queue.push_back(ScheduledChunk { start, chunk });
        start
    }

    /// Drops every chunk that has not started by now and resets the cursor,
    /// so the next enqueue schedules relative to the present instead of the
    /// stale cursor.
    pub fn interrupt(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        state.queue.retain(|c| c.start <= now);
        state.cursor = now;
        self.meter.reset();
    }

    /// Removes and returns the chunks due to start at or before now.
    /// Called by the output device pull loop.
    pub fn take_due(&self) -> Vec<ScheduledChunk> {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        let mut due = Vec::new();
        while state.queue.front().is_some_and(|c| c.start <= now) {
            if let Some(chunk) = state.queue.pop_front() {
                due.push(chunk);
            }
        }
        due
    }

    /// Number of chunks waiting in the queue.
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    /// Current output volume envelope for UI feedback.
    pub fn volume(&self) -> f32 {
        self.meter.level()
    }

    /// The configured playback sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}
