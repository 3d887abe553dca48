//! Immutable settings snapshot consumed by the orchestrator.
//!
//! Built once from [`TypewispConfig`] and shared by `Arc`. Each session keeps
//! the snapshot that was current when it started; a reload only affects the
//! next session.

use std::time::Duration;

use typewisp_core::config::TypewispConfig;
use typewisp_core::error::{Result, TypewispError};
use typewisp_core::types::{RecordMode, RecordingFocusPolicy};

use crate::hotkey::HotkeyBindings;
use crate::typing::TypingProfile;

#[derive(Debug, Clone, PartialEq)]
pub struct DictationSettings {
    pub record_mode: RecordMode,
    pub auto_type: bool,
    pub refocus_window: bool,
    pub bindings: HotkeyBindings,
    pub pause_media: bool,
    pub language: Option<String>,
    pub transcription_timeout: Duration,
    pub recording_focus_policy: RecordingFocusPolicy,
    pub focus_poll_interval: Duration,
    pub typing: TypingProfile,
}

impl DictationSettings {
    /// Validate a loaded configuration.
    ///
    /// Every failure is a `TypewispError::Config`; the app reports it once at
    /// startup and exits before registering any hotkey.
    pub fn from_config(config: &TypewispConfig) -> Result<Self> {
        let dictation = &config.dictation;

        if dictation.transcription_timeout_secs == 0 {
            return Err(TypewispError::Config(
                "[dictation] transcription_timeout_secs must be at least 1".into(),
            ));
        }
        if dictation.focus_poll_ms == 0 {
            return Err(TypewispError::Config(
                "[dictation] focus_poll_ms must be at least 1".into(),
            ));
        }

        Ok(Self {
            record_mode: dictation.record_mode,
            auto_type: dictation.auto_type,
            refocus_window: dictation.refocus_window,
            bindings: HotkeyBindings::from_config(dictation)?,
            pause_media: dictation.pause_media,
            language: dictation
                .language
                .as_ref()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty() && l != "auto"),
            transcription_timeout: Duration::from_secs(dictation.transcription_timeout_secs),
            recording_focus_policy: dictation.recording_focus_policy,
            focus_poll_interval: Duration::from_millis(dictation.focus_poll_ms),
            typing: TypingProfile::from_config(&config.typing)?,
        })
    }
}
