use thiserror::Error;

/// Top-level error type for Typewisp.
///
/// Capture and transcription failures abort the current session but are never
/// fatal to the process. Configuration errors are raised once, before any
/// hotkey is registered.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TypewispError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Injection error: {0}")]
    Injection(#[from] InjectionError),

    #[error("Dictation error: {0}")]
    Dictation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

/// Failures reported by a transcription backend or by the timeout around it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptionError {
    #[error("transcription timed out after {0} seconds")]
    Timeout(u64),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("malformed result: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

/// Failures while injecting keystrokes into the focused application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    #[error("character {0:?} cannot be typed on this backend")]
    Unsupported(char),

    #[error("input focus left the target window")]
    FocusLost,

    #[error("keystroke backend failed: {0}")]
    Backend(String),
}

impl From<toml::de::Error> for TypewispError {
    fn from(err: toml::de::Error) -> Self {
        TypewispError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TypewispError {
    fn from(err: toml::ser::Error) -> Self {
        TypewispError::Config(err.to_string())
    }
}

/// A specialized `Result` type for Typewisp operations.
pub type Result<T> = std::result::Result<T, TypewispError>;
