//! Typewisp audio crate - microphone stream lifecycle and sample buffering.
//!
//! An [`AudioCaptureSession`] opens the configured [`AudioInput`] and hands
//! out a [`CaptureHandle`]. The handle owns the stream until it is either
//! finalized (sealing the buffer into a [`RecordedAudio`]) or aborted. Both
//! consume the handle, so a recording can only be sealed once.

pub mod convert;
#[cfg(feature = "cpal")]
pub mod microphone;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use uuid::Uuid;

use typewisp_core::error::{Result, TypewispError};

#[cfg(feature = "cpal")]
pub use microphone::{list_devices, CpalInput};

// =============================================================================
// Buffer
// =============================================================================

/// Thread-safe, append-only sample buffer.
///
/// The device callback pushes into it while recording; nothing downstream
/// reads it until the capture is finalized, so pushes never wait on a
/// consumer. Growth is bounded only by available memory.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    samples: Arc<Mutex<Vec<f32>>>,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that panicked mid-push leaves whole samples behind, so a
    /// poisoned lock still holds usable audio.
    fn lock(&self) -> MutexGuard<'_, Vec<f32>> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append samples in arrival order.
    pub fn push(&self, data: &[f32]) {
        self.lock().extend_from_slice(data);
    }

    /// Take all buffered samples, leaving the buffer empty.
    pub fn take(&self) -> Vec<f32> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of samples currently buffered.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Finalized mono PCM audio, handed to the transcriber by value.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl RecordedAudio {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// =============================================================================
// Traits
// =============================================================================

/// A source of microphone samples.
///
/// Implementations open a device stream that pushes mono f32 samples at
/// [`AudioInput::sample_rate`] into the given buffer until closed.
pub trait AudioInput: Send + Sync {
    /// Human-readable device name for logs.
    fn name(&self) -> String;

    /// Sample rate of the samples delivered into the buffer.
    fn sample_rate(&self) -> u32;

    /// Open the device. Fails with `TypewispError::Capture` when no device is
    /// available.
    fn open(&self, buffer: AudioBuffer) -> Result<Box<dyn InputStream>>;
}

/// A live device stream. Closing it stops sample delivery.
pub trait InputStream: Send {
    fn close(&mut self);
}

// =============================================================================
// Capture session
// =============================================================================

/// Starts recordings on a shared audio input.
#[derive(Clone)]
pub struct AudioCaptureSession {
    input: Arc<dyn AudioInput>,
}

impl AudioCaptureSession {
    pub fn new(input: Arc<dyn AudioInput>) -> Self {
        Self { input }
    }

    /// Open the microphone and start buffering.
    pub fn start(&self) -> Result<CaptureHandle> {
        let buffer = AudioBuffer::new();
        let stream = self.input.open(buffer.clone())?;
        let handle = CaptureHandle {
            id: Uuid::new_v4(),
            buffer,
            stream: Some(stream),
            sample_rate: self.input.sample_rate(),
            started_at: Instant::now(),
        };
        tracing::info!(
            capture_id = %handle.id,
            device = %self.input.name(),
            sample_rate = handle.sample_rate,
            "Audio capture started"
        );
        Ok(handle)
    }
}

impl std::fmt::Debug for AudioCaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCaptureSession")
            .field("input", &self.input.name())
            .finish()
    }
}

/// Exclusive ownership of one in-progress recording.
pub struct CaptureHandle {
    id: Uuid,
    buffer: AudioBuffer,
    stream: Option<Box<dyn InputStream>>,
    sample_rate: u32,
    started_at: Instant,
}

impl CaptureHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Close the stream and seal everything buffered so far.
    pub fn finalize(mut self) -> RecordedAudio {
        self.close_stream();
        let audio = RecordedAudio {
            samples: self.buffer.take(),
            sample_rate: self.sample_rate,
        };
        tracing::info!(
            capture_id = %self.id,
            samples = audio.samples.len(),
            duration_secs = audio.duration_secs(),
            "Audio capture finalized"
        );
        audio
    }

    /// Close the stream and discard the buffered samples.
    pub fn abort(mut self) {
        self.close_stream();
        let dropped = self.buffer.take().len();
        tracing::info!(capture_id = %self.id, dropped_samples = dropped, "Audio capture aborted");
    }

    fn close_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if self.stream.is_some() {
            tracing::debug!(capture_id = %self.id, "Capture handle dropped while open");
            self.close_stream();
        }
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("id", &self.id)
            .field("open", &self.stream.is_some())
            .field("buffered_samples", &self.buffer.len())
            .finish()
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock microphone for tests and the console front-end.
///
/// On open it pushes a fixed block of samples into the buffer, or fails as if
/// no device were present. Tracks open streams so tests can assert that every
/// capture was closed.
#[derive(Debug, Clone)]
pub struct MockAudioInput {
    samples: Vec<f32>,
    sample_rate: u32,
    failure: Option<String>,
    open_streams: Arc<AtomicUsize>,
    opened_total: Arc<AtomicUsize>,
    last_buffer: Arc<Mutex<Option<AudioBuffer>>>,
}

impl MockAudioInput {
    pub fn with_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            failure: None,
            open_streams: Arc::new(AtomicUsize::new(0)),
            opened_total: Arc::new(AtomicUsize::new(0)),
            last_buffer: Arc::new(Mutex::new(None)),
        }
    }

    /// A low-amplitude tone lasting `secs` seconds.
    pub fn tone(secs: f32, sample_rate: u32) -> Self {
        let len = (secs * sample_rate as f32) as usize;
        let samples = (0..len)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.1)
            .collect();
        Self::with_samples(samples, sample_rate)
    }

    /// A device that fails to open.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let mut input = Self::with_samples(Vec::new(), 16000);
        input.failure = Some(reason.into());
        input
    }

    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }

    /// Push extra samples into the most recently opened stream.
    pub fn feed(&self, samples: &[f32]) {
        if let Ok(guard) = self.last_buffer.lock() {
            if let Some(buffer) = guard.as_ref() {
                buffer.push(samples);
            }
        }
    }
}

struct MockStream {
    open_streams: Arc<AtomicUsize>,
    closed: bool,
}

impl InputStream for MockStream {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl AudioInput for MockAudioInput {
    fn name(&self) -> String {
        "mock microphone".to_string()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn open(&self, buffer: AudioBuffer) -> Result<Box<dyn InputStream>> {
        if let Some(reason) = &self.failure {
            return Err(TypewispError::Capture(reason.clone()));
        }
        buffer.push(&self.samples);
        if let Ok(mut guard) = self.last_buffer.lock() {
            *guard = Some(buffer);
        }
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            open_streams: Arc::clone(&self.open_streams),
            closed: false,
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_buffer_push_take() {
        let buf = AudioBuffer::new();
        assert!(buf.is_empty());

        buf.push(&[0.1, 0.2, 0.3]);
        buf.push(&[0.4]);
        assert_eq!(buf.len(), 4);

        assert_eq!(buf.take(), vec![0.1, 0.2, 0.3, 0.4]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_audio_buffer_survives_poisoned_lock() {
        let buf = AudioBuffer::new();
        buf.push(&[0.1, 0.2]);

        let writer = buf.clone();
        let crashed = std::thread::spawn(move || {
            let _guard = writer.samples.lock().unwrap();
            panic!("device callback crashed");
        })
        .join();
        assert!(crashed.is_err());

        buf.push(&[0.3]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.take(), vec![0.1, 0.2, 0.3]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_audio_buffer_clone_is_shared() {
        let buf = AudioBuffer::new();
        let writer = buf.clone();
        writer.push(&[1.0, 2.0]);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_recorded_audio_duration() {
        let audio = RecordedAudio {
            samples: vec![0.0; 32000],
            sample_rate: 16000,
        };
        assert!((audio.duration_secs() - 2.0).abs() < f32::EPSILON);

        let empty = RecordedAudio {
            samples: Vec::new(),
            sample_rate: 0,
        };
        assert_eq!(empty.duration_secs(), 0.0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_finalize_seals_samples_in_order() {
        let input = MockAudioInput::with_samples(vec![0.1, 0.2], 16000);
        let session = AudioCaptureSession::new(Arc::new(input.clone()));

        let handle = session.start().unwrap();
        input.feed(&[0.3, 0.4]);
        assert_eq!(handle.buffered_samples(), 4);
        assert_eq!(input.open_streams(), 1);

        let audio = handle.finalize();
        assert_eq!(audio.samples, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(input.open_streams(), 0);
    }

    #[test]
    fn test_abort_closes_stream() {
        let input = MockAudioInput::tone(0.5, 16000);
        let session = AudioCaptureSession::new(Arc::new(input.clone()));

        let handle = session.start().unwrap();
        handle.abort();
        assert_eq!(input.open_streams(), 0);
        assert_eq!(input.opened_total(), 1);
    }

    #[test]
    fn test_drop_closes_stream() {
        let input = MockAudioInput::tone(0.1, 16000);
        let session = AudioCaptureSession::new(Arc::new(input.clone()));
        {
            let _handle = session.start().unwrap();
            assert_eq!(input.open_streams(), 1);
        }
        assert_eq!(input.open_streams(), 0);
    }

    #[test]
    fn test_start_fails_without_device() {
        let input = MockAudioInput::unavailable("no microphone");
        let session = AudioCaptureSession::new(Arc::new(input.clone()));

        let err = session.start().unwrap_err();
        assert!(matches!(err, TypewispError::Capture(_)));
        assert!(err.to_string().contains("no microphone"));
        assert_eq!(input.open_streams(), 0);
    }

    #[test]
    fn test_tone_length() {
        let input = MockAudioInput::tone(2.0, 16000);
        let session = AudioCaptureSession::new(Arc::new(input));
        let audio = session.start().unwrap().finalize();
        assert_eq!(audio.samples.len(), 32000);
    }
}
