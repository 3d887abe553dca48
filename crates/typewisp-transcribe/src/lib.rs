//! Typewisp transcribe crate - the speech-to-text boundary.
//!
//! The dictation core only sees [`TranscriptionAdapter`]: finalized audio in,
//! text out. The orchestrator runs it on its own task and enforces the
//! timeout, so adapters never need to watch the clock themselves.

#[cfg(feature = "whisper")]
pub mod whisper;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use typewisp_audio::RecordedAudio;
use typewisp_core::error::TranscriptionError;

#[cfg(feature = "whisper")]
pub use whisper::WhisperTranscriber;

// =============================================================================
// Result types
// =============================================================================

/// A single time-aligned segment within a transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Start time in seconds from the beginning of the audio.
    pub start: f32,
    /// End time in seconds from the beginning of the audio.
    pub end: f32,
    pub text: String,
}

/// The complete result of a transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    /// Full transcribed text.
    pub text: String,
    pub segments: Vec<Segment>,
    /// Language used for decoding, if known.
    pub language: Option<String>,
    /// Total audio duration in seconds.
    pub duration_secs: f32,
}

impl TranscriptionResult {
    /// A result with a single segment spanning the whole clip.
    pub fn from_text(text: impl Into<String>, duration_secs: f32) -> Self {
        let text = text.into();
        Self {
            segments: vec![Segment {
                start: 0.0,
                end: duration_secs,
                text: text.clone(),
            }],
            text,
            language: None,
            duration_secs,
        }
    }

    /// True when there is nothing worth typing.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Converts finalized audio into text.
///
/// The audio is passed by value: once handed over, the dictation session
/// keeps no reference to it.
#[async_trait]
pub trait TranscriptionAdapter: Send + Sync {
    async fn transcribe(
        &self,
        audio: RecordedAudio,
        language: Option<String>,
    ) -> Result<TranscriptionResult, TranscriptionError>;
}

// =============================================================================
// Mock implementations
// =============================================================================

/// Transcriber that describes the audio it was given.
///
/// Used by the console front-end when no model is configured, so the whole
/// pipeline can be exercised without whisper.cpp.
#[derive(Debug, Clone, Default)]
pub struct MockTranscriber;

impl MockTranscriber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TranscriptionAdapter for MockTranscriber {
    async fn transcribe(
        &self,
        audio: RecordedAudio,
        language: Option<String>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        if audio.sample_rate == 0 {
            return Err(TranscriptionError::Malformed(
                "sample rate must be greater than 0".into(),
            ));
        }
        let duration_secs = audio.duration_secs();
        tracing::debug!(duration_secs, "Mock transcription generated");

        let mut result = TranscriptionResult::from_text(
            format!("heard {duration_secs:.1} seconds of audio."),
            duration_secs,
        );
        result.language = language;
        Ok(result)
    }
}

/// Transcriber that replays a fixed queue of outcomes.
///
/// Each call pops the next outcome, optionally after a delay (observe it
/// under `tokio::time::pause` for deterministic tests). Once the queue is
/// exhausted every call fails with `TranscriptionError::Other`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTranscriber {
    outcomes: Arc<Mutex<VecDeque<Result<String, TranscriptionError>>>>,
    delay: Duration,
    received: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    pub fn then_error(self, error: TranscriptionError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue another outcome on a transcriber that is already shared.
    pub fn push(&self, outcome: Result<String, TranscriptionError>) {
        if let Ok(mut queue) = self.outcomes.lock() {
            queue.push_back(outcome);
        }
    }

    /// Sample counts of every clip received, in call order.
    pub fn received(&self) -> Vec<usize> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.received().len()
    }
}

#[async_trait]
impl TranscriptionAdapter for ScriptedTranscriber {
    async fn transcribe(
        &self,
        audio: RecordedAudio,
        language: Option<String>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(audio.samples.len());
        }

        let next = self.outcomes.lock().ok().and_then(|mut q| q.pop_front());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match next {
            Some(Ok(text)) => {
                let mut result = TranscriptionResult::from_text(text, audio.duration_secs());
                result.language = language;
                Ok(result)
            }
            Some(Err(e)) => Err(e),
            None => Err(TranscriptionError::Other("no scripted outcome left".into())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
