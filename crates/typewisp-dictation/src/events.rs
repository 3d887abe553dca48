//! Events consumed by the orchestrator loop.
//!
//! Everything that can change dictation state arrives here: hotkeys and focus
//! changes from the input capability, user commands from the tray or console,
//! and completions from the transcription, typing and improve tasks. The
//! loop handles them one at a time, so transitions are linearizable.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use typewisp_core::error::{Result, TranscriptionError, TypewispError};
use typewisp_core::types::WindowId;
use typewisp_transcribe::TranscriptionResult;

use crate::hotkey::HotkeyRole;
use crate::settings::DictationSettings;
use crate::typing::TypingReport;

/// Capacity of the orchestrator's event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum DictationEvent {
    HotkeyDown(HotkeyRole),
    HotkeyUp(HotkeyRole),
    /// The foreground window changed.
    FocusChanged(WindowId),
    Pause,
    Resume,
    TogglePause,
    /// Abandon whatever is in flight and return to Ready.
    Stop,
    /// Swap the settings used by the next session.
    Reload(Arc<DictationSettings>),
    Shutdown,
    TranscriptReady {
        session_id: Uuid,
        result: TranscriptionResult,
    },
    TranscriptionFailed {
        session_id: Uuid,
        error: TranscriptionError,
    },
    TypingFinished(TypingReport),
    ImproveFinished {
        request_id: Uuid,
        result: std::result::Result<String, String>,
    },
}

/// Cloneable producer side of the event queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<DictationEvent>,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::Sender<DictationEvent>) -> Self {
        Self { tx }
    }

    /// Create a detached queue, for capabilities under test.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DictationEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue without waiting. Safe to call from OS hook callbacks.
    ///
    /// Returns false if the event was dropped because the queue is full or
    /// the orchestrator has stopped.
    pub fn emit(&self, event: DictationEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(?event, "Dictation event queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Dictation event queue closed");
                false
            }
        }
    }

    /// Enqueue, waiting for room. Used for task completions, which must
    /// never be dropped.
    pub async fn send(&self, event: DictationEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| TypewispError::ShuttingDown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
