//! Multi-source capture with mixing and per-source metering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::chunk::{AudioChunk, CAPTURE_SAMPLE_RATE};
use crate::error::{AudioError, Result};
use crate::frame::{FrameBuffer, FRAME_SAMPLES};
use crate::meter::VolumeMeter;

/// A live audio source pulled by the capture thread.
///
/// Implementations wrap whatever the platform provides (a microphone
/// callback queue, a loopback capture of system audio, a file in tests).
/// `read` must not block for long: return `Ok(0)` when no samples are ready
/// yet and the capture thread will come back.
pub trait CaptureSource: Send + 'static {
    /// Short label used in logs.
    fn label(&self) -> &str;

    /// Acquires the underlying device. Called once before the first read.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Reads up to `buf.len()` float samples in [-1, 1].
    /// Returns the number of samples written; `Ok(0)` means none ready.
    fn read(&mut self, buf: &mut [f32]) -> Result<usize>;

    /// Releases the underlying device.
    fn stop(&mut self) {}
}

/// Options for configuring a [`Recorder`].
#[derive(Debug, Clone)]
pub struct RecorderOptions {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per emitted chunk.
    pub frame_samples: usize,
    /// Per-source attenuation applied when two sources are mixed.
    pub mix_gain: f32,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            sample_rate: CAPTURE_SAMPLE_RATE,
            frame_samples: FRAME_SAMPLES,
            mix_gain: 0.7,
        }
    }
}

/// Captures audio from a primary source plus an optional secondary source,
/// mixes them, and emits fixed-size PCM chunks.
///
/// One capture thread owns the primary source for the lifetime of a run.
/// The secondary slot (system audio during a screen share) can be attached
/// and removed while running. When both sources are active their samples
/// are summed per index with `mix_gain` applied to each so the sum cannot
/// clip at full scale.
///
/// `start` is gated on any previous run having fully stopped, so two runs
/// never interleave chunks onto the same channel.
pub struct Recorder {
    opts: RecorderOptions,
    mic_meter: Arc<VolumeMeter>,
    system_meter: Arc<VolumeMeter>,
    muted: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    secondary: Arc<Mutex<Option<Box<dyn CaptureSource>>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Recorder {
    /// Creates a recorder with the given options.
    pub fn new(opts: RecorderOptions) -> Self {
        Self {
            opts,
            mic_meter: Arc::new(VolumeMeter::new()),
            system_meter: Arc::new(VolumeMeter::new()),
            muted: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            secondary: Arc::new(Mutex::new(None)),
            handle: None,
        }
    }

    /// Starts capturing from `source`, sending chunks to `chunks`.
    ///
    /// Fails with [`AudioError::AlreadyRunning`] if a capture run is active;
    /// device acquisition errors from the source (`NoDevice`,
    /// `PermissionDenied`) propagate to the caller unchanged.
    pub fn start(
        &mut self,
        mut source: Box<dyn CaptureSource>,
        chunks: mpsc::Sender<AudioChunk>,
    ) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }
        // A previous run may have signalled stop without being joined yet;
        // wait for it so two capture threads never overlap.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        source.start()?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let muted = self.muted.clone();
        let secondary = self.secondary.clone();
        let mic_meter = self.mic_meter.clone();
        let system_meter = self.system_meter.clone();
        let opts = self.opts.clone();

        let handle = thread::spawn(move || {
            capture_loop(
                source,
                secondary,
                chunks,
                running,
                muted,
                mic_meter,
                system_meter,
                opts,
            );
        });
        self.handle = Some(handle);
        Ok(())
    }

    /// Stops capturing and waits for the capture thread to finish.
    ///
    /// Safe to call when not running. A trailing partial frame is flushed
    /// before the thread exits.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.mic_meter.reset();
        self.system_meter.reset();
    }

    /// Returns true while a capture run is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Attaches (or replaces) the secondary source.
    pub fn add_source(&self, mut source: Box<dyn CaptureSource>) -> Result<()> {
        source.start()?;
        let mut slot = self.secondary.lock().unwrap();
        if let Some(mut old) = slot.replace(source) {
            old.stop();
        }
        debug!("secondary capture source attached");
        Ok(())
    }

    /// Detaches the secondary source if one is attached.
    pub fn remove_source(&self) {
        let mut slot = self.secondary.lock().unwrap();
        if let Some(mut old) = slot.take() {
            old.stop();
        }
        drop(slot);
        // Zero reading so UI feedback reflects the removal immediately.
        self.system_meter.reset();
    }

    /// Mutes or unmutes the outbound chunk stream. Metering keeps running
    /// while muted.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    /// Returns true if outbound chunks are suppressed.
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Current microphone volume envelope.
    pub fn volume(&self) -> f32 {
        self.mic_meter.level()
    }

    /// Current secondary-source volume envelope.
    pub fn system_volume(&self) -> f32 {
        self.system_meter.level()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sums two sources per index with per-source attenuation, clamping the
/// result to [-1, 1].
fn mix_sources(primary: &[f32], secondary: &[f32], gain: f32, out: &mut Vec<f32>) {
    out.clear();
    out.reserve(primary.len());
    for (i, &p) in primary.iter().enumerate() {
        let s = secondary.get(i).copied().unwrap_or(0.0);
        out.push((p * gain + s * gain).clamp(-1.0, 1.0));
    }
}

#[allow(clippy::too_many_arguments)]
fn capture_loop(
    mut source: Box<dyn CaptureSource>,
    secondary: Arc<Mutex<Option<Box<dyn CaptureSource>>>>,
    chunks: mpsc::Sender<AudioChunk>,
    running: Arc<AtomicBool>,
    muted: Arc<AtomicBool>,
    mic_meter: Arc<VolumeMeter>,
    system_meter: Arc<VolumeMeter>,
    opts: RecorderOptions,
) {
    let mut frame = FrameBuffer::with_frame_size(opts.sample_rate, opts.frame_samples);
    let mut primary_buf = vec![0.0f32; 512];
    let mut secondary_buf = vec![0.0f32; 512];
    let mut mix_buf: Vec<f32> = Vec::with_capacity(512);
    let mut closed = false;

    while running.load(Ordering::SeqCst) && !closed {
        let n = match source.read(&mut primary_buf) {
            Ok(n) => n,
            Err(e) => {
                warn!(source = source.label(), "capture read failed: {}", e);
                break;
            }
        };
        if n == 0 {
            thread::sleep(Duration::from_millis(2));
            continue;
        }
        let primary = &primary_buf[..n];
        mic_meter.update(primary);

        // Pull matching samples from the secondary source, zero-filling
        // whatever it cannot provide so the two stay frame-aligned.
        let mixed: &[f32] = {
            let mut slot = secondary.lock().unwrap();
            if let Some(sec) = slot.as_mut() {
                secondary_buf[..n].fill(0.0);
                match sec.read(&mut secondary_buf[..n]) {
                    Ok(_) => {}
                    Err(e) => {
                        warn!(source = sec.label(), "secondary read failed: {}", e);
                    }
                }
                system_meter.update(&secondary_buf[..n]);
                mix_sources(primary, &secondary_buf[..n], opts.mix_gain, &mut mix_buf);
                &mix_buf
            } else {
                primary
            }
        };

        if muted.load(Ordering::SeqCst) {
            continue;
        }

        frame.push(mixed, &mut |chunk| {
            if chunks.blocking_send(chunk).is_err() {
                closed = true;
            }
        });
    }

    // Flush trailing audio unless the receiver is gone.
    if !closed {
        frame.flush(&mut |chunk| {
            let _ = chunks.blocking_send(chunk);
        });
    }

    source.stop();
    if let Some(sec) = secondary.lock().unwrap().as_mut() {
        sec.stop();
    }
    running.store(false, Ordering::SeqCst);
    debug!("capture loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source that yields a fixed buffer of samples, then no data.
    struct VecSource {
        samples: Vec<f32>,
        pos: usize,
        fail_start: Option<AudioError>,
    }

    impl VecSource {
        fn new(samples: Vec<f32>) -> Self {
            Self {
                samples,
                pos: 0,
                fail_start: None,
            }
        }

        fn failing(err: AudioError) -> Self {
            Self {
                samples: Vec::new(),
                pos: 0,
                fail_start: Some(err),
            }
        }
    }

    impl CaptureSource for VecSource {
        fn label(&self) -> &str {
            "test"
        }

        fn start(&mut self) -> Result<()> {
            match self.fail_start.take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
            let remaining = self.samples.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_mix_attenuates_both_sources() {
        let mut out = Vec::new();
        mix_sources(&[0.5, 0.5], &[0.5, -0.5], 0.7, &mut out);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.7).abs() < 1e-6);
        assert!(out[1].abs() < 1e-6);
    }

    #[test]
    fn test_mix_clamps_at_full_scale() {
        let mut out = Vec::new();
        mix_sources(&[1.0], &[1.0], 0.7, &mut out);
        assert!(out[0] <= 1.0);

        mix_sources(&[-1.0], &[-1.0], 0.7, &mut out);
        assert!(out[0] >= -1.0);
    }

    #[test]
    fn test_mix_short_secondary_zero_fills() {
        let mut out = Vec::new();
        mix_sources(&[0.5, 0.5, 0.5], &[0.5], 0.7, &mut out);
        assert_eq!(out.len(), 3);
        assert!((out[1] - 0.35).abs() < 1e-6);
        assert!((out[2] - 0.35).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_recorder_emits_frames() {
        let mut recorder = Recorder::new(RecorderOptions {
            frame_samples: 256,
            ..Default::default()
        });
        let (tx, mut rx) = mpsc::channel(16);

        recorder
            .start(Box::new(VecSource::new(vec![0.5; 512])), tx)
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for chunk")
            .expect("channel closed");
        assert_eq!(first.len(), 512); // 256 samples * 2 bytes

        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for chunk")
            .expect("channel closed");
        assert_eq!(second.len(), 512);

        recorder.stop();
        assert!(!recorder.is_running());
    }

    #[tokio::test]
    async fn test_start_surfaces_device_errors() {
        let mut recorder = Recorder::new(RecorderOptions::default());
        let (tx, _rx) = mpsc::channel(16);

        let err = recorder
            .start(Box::new(VecSource::failing(AudioError::PermissionDenied)), tx)
            .unwrap_err();
        assert!(matches!(err, AudioError::PermissionDenied));
        assert!(!recorder.is_running());
    }

    #[tokio::test]
    async fn test_start_while_running_fails() {
        let mut recorder = Recorder::new(RecorderOptions::default());
        let (tx, _rx) = mpsc::channel(16);
        let (tx2, _rx2) = mpsc::channel(16);

        recorder
            .start(Box::new(VecSource::new(vec![0.0; 64])), tx)
            .unwrap();
        let err = recorder
            .start(Box::new(VecSource::new(vec![0.0; 64])), tx2)
            .unwrap_err();
        assert!(matches!(err, AudioError::AlreadyRunning));
        recorder.stop();
    }

    #[tokio::test]
    async fn test_stop_flushes_partial_frame() {
        let mut recorder = Recorder::new(RecorderOptions {
            frame_samples: 1024,
            ..Default::default()
        });
        let (tx, mut rx) = mpsc::channel(16);

        // 100 samples: less than one frame, only visible after flush.
        recorder
            .start(Box::new(VecSource::new(vec![0.25; 100])), tx)
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        recorder.stop();

        let chunk = rx.recv().await.expect("expected flushed partial frame");
        assert_eq!(chunk.len(), 200);
    }

    #[tokio::test]
    async fn test_mute_suppresses_chunks() {
        let mut recorder = Recorder::new(RecorderOptions {
            frame_samples: 64,
            ..Default::default()
        });
        recorder.set_muted(true);
        let (tx, mut rx) = mpsc::channel(16);

        recorder
            .start(Box::new(VecSource::new(vec![0.5; 256])), tx)
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        recorder.stop();

        assert!(rx.recv().await.is_none());
        // Metering is unaffected by mute.
        assert!(recorder.volume() >= 0.0);
    }

    #[test]
    fn test_remove_source_resets_system_meter() {
        let recorder = Recorder::new(RecorderOptions::default());
        recorder
            .add_source(Box::new(VecSource::new(vec![0.5; 64])))
            .unwrap();
        recorder.system_meter.update(&[1.0; 64]);
        assert!(recorder.system_volume() > 0.0);

        recorder.remove_source();
        assert_eq!(recorder.system_volume(), 0.0);
    }
}
