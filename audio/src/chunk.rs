//! PCM audio chunk type.

use std::time::Duration;

use base64::Engine;

/// Sample rate of outbound (capture) audio.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of inbound (service) audio.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// One unit of 16-bit signed little-endian mono PCM audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    sample_rate: u32,
    data: Vec<u8>,
}

impl AudioChunk {
    /// Creates a chunk from raw PCM bytes.
    pub fn new(sample_rate: u32, data: Vec<u8>) -> Self {
        Self { sample_rate, data }
    }

    /// Creates a chunk from i16 samples.
    pub fn from_samples(sample_rate: u32, samples: &[i16]) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        Self { sample_rate, data }
    }

    /// Decodes a chunk from a base64 payload.
    pub fn from_base64(sample_rate: u32, payload: &str) -> Result<Self, base64::DecodeError> {
        let data = base64::engine::general_purpose::STANDARD.decode(payload)?;
        Ok(Self { sample_rate, data })
    }

    /// Returns the sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the raw PCM bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the chunk and returns the raw PCM bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the chunk holds no audio.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the mime type descriptor, e.g. `audio/pcm;rate=16000`.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }

    /// Encodes the PCM payload as base64 for transport.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Returns the audio data as i16 samples.
    pub fn samples(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    /// Returns the play duration of the chunk.
    pub fn duration(&self) -> Duration {
        let samples = (self.data.len() / 2) as u64;
        Duration::from_nanos(samples * 1_000_000_000 / self.sample_rate as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type() {
        let chunk = AudioChunk::new(CAPTURE_SAMPLE_RATE, vec![0, 0]);
        assert_eq!(chunk.mime_type(), "audio/pcm;rate=16000");

        let chunk = AudioChunk::new(PLAYBACK_SAMPLE_RATE, vec![0, 0]);
        assert_eq!(chunk.mime_type(), "audio/pcm;rate=24000");
    }

    #[test]
    fn test_samples_roundtrip() {
        let samples: Vec<i16> = vec![0, 1000, -1000, i16::MAX, i16::MIN];
        let chunk = AudioChunk::from_samples(16_000, &samples);
        assert_eq!(chunk.len(), samples.len() * 2);
        assert_eq!(chunk.samples(), samples);
    }

    #[test]
    fn test_base64_roundtrip() {
        let chunk = AudioChunk::from_samples(16_000, &[1, 2, 3, 4]);
        let encoded = chunk.to_base64();
        let decoded = AudioChunk::from_base64(16_000, &encoded).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn test_duration() {
        // 16000 samples at 16kHz = 1 second
        let chunk = AudioChunk::new(16_000, vec![0u8; 32_000]);
        assert_eq!(chunk.duration(), Duration::from_secs(1));

        // 2048 samples at 16kHz = 128ms
        let chunk = AudioChunk::new(16_000, vec![0u8; 4096]);
        assert_eq!(chunk.duration(), Duration::from_millis(128));
    }
}
