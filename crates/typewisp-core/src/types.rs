use std::fmt;

use serde::{Deserialize, Serialize};

/// How the record hotkey drives a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Recording lasts only while the hotkey is physically held down.
    Hold,
    /// First press starts recording, the second press stops it.
    #[default]
    Toggle,
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordMode::Hold => write!(f, "hold"),
            RecordMode::Toggle => write!(f, "toggle"),
        }
    }
}

impl std::str::FromStr for RecordMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hold" => Ok(RecordMode::Hold),
            "toggle" => Ok(RecordMode::Toggle),
            other => Err(format!("unknown record mode '{other}' (expected hold or toggle)")),
        }
    }
}

/// What to do when input focus leaves the target window while recording.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingFocusPolicy {
    /// Do nothing.
    Ignore,
    /// Log the divergence and keep recording.
    #[default]
    Log,
    /// Stop recording and transcribe what was captured so far.
    Stop,
    /// Discard the recording.
    Abort,
}

/// Opaque identity of an OS window, as reported by the input capability.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User-visible status published by the orchestrator on every transition.
///
/// This is the single authoritative stream consumed by tray and terminal
/// front-ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StatusSignal {
    Ready,
    Recording,
    Processing,
    Typing,
    /// Hotkeys are disabled until the resume control is used.
    Paused,
    /// A session failed; a `Ready` always follows.
    Error(String),
}

impl StatusSignal {
    pub fn is_error(&self) -> bool {
        matches!(self, StatusSignal::Error(_))
    }

    /// Short lowercase label, used for tray tooltips and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            StatusSignal::Ready => "ready",
            StatusSignal::Recording => "recording",
            StatusSignal::Processing => "processing",
            StatusSignal::Typing => "typing",
            StatusSignal::Paused => "paused",
            StatusSignal::Error(_) => "error",
        }
    }
}

impl fmt::Display for StatusSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusSignal::Error(reason) => write!(f, "Error({reason})"),
            StatusSignal::Ready => write!(f, "Ready"),
            StatusSignal::Recording => write!(f, "Recording"),
            StatusSignal::Processing => write!(f, "Processing"),
            StatusSignal::Typing => write!(f, "Typing"),
            StatusSignal::Paused => write!(f, "Paused"),
        }
    }
}
