//! Fixed-size frame accumulation for outbound PCM.

use crate::chunk::AudioChunk;

/// Samples accumulated before a chunk is emitted. At 16kHz this flushes
/// roughly eight times a second.
pub const FRAME_SAMPLES: usize = 2048;

/// Accumulates float samples into fixed-size 16-bit PCM frames.
///
/// Incoming samples are converted to i16 on arrival; every time the buffer
/// fills, one [`AudioChunk`] is emitted and the buffer restarts. A partial
/// frame can be flushed explicitly when capture stops so trailing audio is
/// not lost.
pub struct FrameBuffer {
    buf: Vec<i16>,
    len: usize,
    sample_rate: u32,
}

impl FrameBuffer {
    /// Creates a frame buffer with the default frame size.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_frame_size(sample_rate, FRAME_SAMPLES)
    }

    /// Creates a frame buffer with a custom frame size.
    pub fn with_frame_size(sample_rate: u32, frame_samples: usize) -> Self {
        assert!(frame_samples > 0, "frame size must be greater than 0");
        Self {
            buf: vec![0; frame_samples],
            len: 0,
            sample_rate,
        }
    }

    /// Returns the number of samples currently buffered.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no samples are buffered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends float samples, emitting one chunk per filled frame.
    pub fn push(&mut self, samples: &[f32], emit: &mut dyn FnMut(AudioChunk)) {
        for &sample in samples {
            self.buf[self.len] = convert_sample(sample);
            self.len += 1;
            if self.len == self.buf.len() {
                self.emit_frame(emit);
            }
        }
    }

    /// Emits any buffered partial frame.
    pub fn flush(&mut self, emit: &mut dyn FnMut(AudioChunk)) {
        if self.len > 0 {
            self.emit_frame(emit);
        }
    }

    fn emit_frame(&mut self, emit: &mut dyn FnMut(AudioChunk)) {
        let chunk = AudioChunk::from_samples(self.sample_rate, &self.buf[..self.len]);
        self.len = 0;
        emit(chunk);
    }
}

/// Converts a float sample in [-1, 1] to a 16-bit signed sample.
fn convert_sample(sample: f32) -> i16 {
    let t = sample.clamp(-1.0, 1.0);
    if t >= 0.0 {
        (t * 32767.0) as i16
    } else {
        (t * 32768.0) as i16
    }
}
