//! Per-source volume metering.

use std::sync::atomic::{AtomicU32, Ordering};

/// An f32 stored in an AtomicU32 via bit transmutation.
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    /// Creates a new AtomicF32 with the given initial value.
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    /// Loads the current value.
    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.bits.load(order))
    }

    /// Stores a new value.
    pub fn store(&self, value: f32, order: Ordering) {
        self.bits.store(value.to_bits(), order);
    }
}

/// A running volume envelope for one audio source.
///
/// Tracks the RMS energy of recent samples with exponential smoothing. The
/// reading is for UI feedback only and never gates the audio data path:
/// `update` is lock-free and `level` can be polled from any thread.
pub struct VolumeMeter {
    level: AtomicF32,
    smoothing: f32,
}

impl VolumeMeter {
    /// Creates a meter with the default smoothing factor.
    pub fn new() -> Self {
        Self::with_smoothing(0.8)
    }

    /// Creates a meter with a custom smoothing factor in [0, 1).
    /// Higher values react more slowly.
    pub fn with_smoothing(smoothing: f32) -> Self {
        Self {
            level: AtomicF32::new(0.0),
            smoothing: smoothing.clamp(0.0, 0.999),
        }
    }

    /// Folds a block of float samples into the envelope.
    pub fn update(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
        let rms = energy.sqrt();
        let prev = self.level.load(Ordering::Relaxed);
        let next = prev * self.smoothing + rms * (1.0 - self.smoothing);
        self.level.store(next, Ordering::Relaxed);
    }

    /// Returns the current envelope level in [0, 1].
    pub fn level(&self) -> f32 {
        self.level.load(Ordering::Relaxed)
    }

    /// Resets the envelope to zero (e.g. when a source is removed).
    pub fn reset(&self) {
        self.level.store(0.0, Ordering::Relaxed);
    }
}

impl Default for VolumeMeter {
    fn default() -> Self {
        Self::new()
    }
}
