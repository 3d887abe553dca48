//! Dictation state machine.
//!
//! Enforces valid transitions for the session lifecycle:
//! - Idle -> Recording (hotkey press)
//! - Recording -> Processing (release / second press / focus policy stop)
//! - Processing -> Typing (transcript ready, auto-type)
//! - Typing -> Idle (job finished or cancelled)
//! - Idle -> Typing (staged transcript confirmed)
//! - Idle -> Improving -> Idle (staged transcript rewritten)
//! - Recording | Processing -> Idle (abort, stop, staged or empty transcript)
//! - Recording | Processing | Typing | Improving -> Error -> Idle
//!
//! The machine is owned by the orchestrator loop and never shared, so it
//! needs no locking.

use std::fmt;

use typewisp_core::error::{Result, TypewispError};
use typewisp_core::types::StatusSignal;

/// Operational state of a dictation session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DictationState {
    /// No session in flight. Ready to record.
    #[default]
    Idle,
    /// Microphone open, audio accumulating.
    Recording,
    /// Audio handed to the transcriber, waiting for text.
    Processing,
    /// Typing job emitting keystrokes.
    Typing,
    /// Staged transcript is being rewritten by the text improver.
    Improving,
    /// A session failed. Always left immediately for Idle.
    Error,
}

impl fmt::Display for DictationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictationState::Idle => write!(f, "Idle"),
            DictationState::Recording => write!(f, "Recording"),
            DictationState::Processing => write!(f, "Processing"),
            DictationState::Typing => write!(f, "Typing"),
            DictationState::Improving => write!(f, "Improving"),
            DictationState::Error => write!(f, "Error"),
        }
    }
}

impl DictationState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &DictationState) -> bool {
        use DictationState::*;
        matches!(
            (self, target),
            (Idle, Recording)
                | (Recording, Processing)
                | (Processing, Typing)
                | (Typing, Idle)
                | (Idle, Typing)
                | (Idle, Improving)
                | (Improving, Idle)
                // Abort / stop / nothing to type
                | (Recording, Idle)
                | (Processing, Idle)
                // Failures
                | (Recording, Error)
                | (Processing, Error)
                | (Typing, Error)
                | (Improving, Error)
                | (Error, Idle)
        )
    }

    /// The status a front-end should show while in this state.
    pub fn status(&self) -> StatusSignal {
        match self {
            DictationState::Idle | DictationState::Error => StatusSignal::Ready,
            DictationState::Recording => StatusSignal::Recording,
            DictationState::Processing | DictationState::Improving => StatusSignal::Processing,
            DictationState::Typing => StatusSignal::Typing,
        }
    }

    /// A session (or improve request) is in flight.
    pub fn is_busy(&self) -> bool {
        !matches!(self, DictationState::Idle)
    }
}

/// Validating state holder, starting in `Idle`.
#[derive(Debug, Default)]
pub struct StateMachine {
    state: DictationState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> DictationState {
        self.state
    }

    /// Attempt to transition to the target state.
    ///
    /// Returns `TypewispError::Dictation` and leaves the state untouched if
    /// the transition is not allowed.
    pub fn transition(&mut self, target: DictationState) -> Result<()> {
        if self.state.can_transition_to(&target) {
            tracing::debug!("Dictation state: {} -> {}", self.state, target);
            self.state = target;
            Ok(())
        } else {
            Err(TypewispError::Dictation(format!(
                "Invalid state transition: {} -> {}",
                self.state, target
            )))
        }
    }

    /// Force the machine back to Idle (error recovery).
    pub fn reset(&mut self) {
        if self.state != DictationState::Idle {
            tracing::warn!("Dictation state machine reset to Idle from {}", self.state);
        }
        self.state = DictationState::Idle;
    }
}

// =============================================================================
// Tests
// =============================================================================
