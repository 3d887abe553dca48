//! Typewisp dictation crate - hotkey-driven recording, transcription and
//! humanized typing.
//!
//! A [`RecordingOrchestrator`] owns the session state machine:
//! Idle -> Recording -> Processing -> Typing -> Idle. All inputs (hotkeys,
//! focus changes, user commands and task completions) are serialized through
//! one event queue, and every transition is published as a
//! [`typewisp_core::StatusSignal`].

pub mod capability;
pub mod events;
pub mod focus;
pub mod hotkey;
pub mod improve;
pub mod media;
pub mod orchestrator;
pub mod session;
pub mod settings;
pub mod state;
pub mod status;
pub mod typing;

pub use capability::{InputCapability, MockInputCapability, UnavailableInput};
pub use events::{DictationEvent, EventSender};
pub use focus::FocusGuard;
pub use hotkey::{Hotkey, HotkeyBindings, HotkeyRole};
pub use improve::{MockTextImprover, TextImprover};
pub use media::{
    CommandMediaController, MediaController, MediaOutcome, NoopMediaController,
    RecordingMediaController,
};
pub use orchestrator::{Collaborators, OrchestratorHandle, RecordingOrchestrator};
pub use settings::DictationSettings;
pub use state::DictationState;
pub use status::{StatusReader, StatusStream};
pub use typing::{TypingEmulator, TypingJob, TypingOutcome, TypingProfile, TypingReport};
