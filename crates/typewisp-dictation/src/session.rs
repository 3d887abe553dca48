//! One recording-to-typing cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use typewisp_audio::{CaptureHandle, RecordedAudio};
use typewisp_core::types::{RecordMode, WindowId};

use crate::settings::DictationSettings;

/// Tracks the data associated with an active dictation session.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    /// Fixed at hotkey press from the settings snapshot.
    pub mode: RecordMode,
    /// Window that had focus when recording started.
    pub target_window: Option<WindowId>,
    pub started_at: DateTime<Utc>,
    pub settings: Arc<DictationSettings>,
    /// Present only while recording.
    capture: Option<CaptureHandle>,
}

impl Session {
    pub fn new(
        settings: Arc<DictationSettings>,
        target_window: Option<WindowId>,
        capture: CaptureHandle,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: settings.record_mode,
            target_window,
            started_at: Utc::now(),
            settings,
            capture: Some(capture),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    pub fn elapsed_secs(&self) -> f32 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_milliseconds() as f32 / 1000.0
    }

    /// Seal the recording. Returns `None` if it was already finalized or
    /// aborted.
    pub fn finalize_audio(&mut self) -> Option<RecordedAudio> {
        self.capture.take().map(CaptureHandle::finalize)
    }

    /// Discard the recording, closing the microphone.
    pub fn abort_audio(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.abort();
        }
    }
}

/// A transcript waiting for the confirm hotkey.
#[derive(Debug, Clone)]
pub struct StagedTranscript {
    /// Session that produced the text.
    pub session_id: Uuid,
    pub text: String,
    /// Snapshot used when the staged text is eventually typed.
    pub settings: Arc<DictationSettings>,
}
