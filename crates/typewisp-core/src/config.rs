use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TypewispError};
use crate::types::{RecordMode, RecordingFocusPolicy};

/// Top-level configuration for Typewisp.
///
/// Loaded from `~/.typewisp/config.toml` by default. The dictation core never
/// reads this directly; it consumes an immutable snapshot built from it at
/// the start of every session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypewispConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dictation: DictationConfig,
    #[serde(default)]
    pub typing: TypingConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

impl TypewispConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TypewispConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TypewispError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Session behaviour and hotkeys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictationConfig {
    pub record_mode: RecordMode,
    /// Type the transcript as soon as it is ready. When false the transcript
    /// is staged until the type hotkey is pressed.
    pub auto_type: bool,
    /// Bring the window that was focused at recording start back to the
    /// front around typing.
    pub refocus_window: bool,
    /// Record hotkey, e.g. `<f8>` or `Ctrl+Shift+D`.
    pub hotkey: String,
    /// Confirm hotkey that types a staged transcript.
    pub type_hotkey: String,
    /// Hotkey that sends a staged transcript through the text improver.
    pub improve_hotkey: String,
    /// Optional hotkey that toggles the paused state.
    pub pause_hotkey: Option<String>,
    /// Pause the OS media session while recording.
    pub pause_media: bool,
    /// Language hint passed to the transcriber (`None` = auto-detect).
    pub language: Option<String>,
    pub transcription_timeout_secs: u64,
    pub recording_focus_policy: RecordingFocusPolicy,
    /// Foreground window polling interval, for backends without focus events.
    pub focus_poll_ms: u64,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            record_mode: RecordMode::Toggle,
            auto_type: true,
            refocus_window: true,
            hotkey: "<f8>".to_string(),
            type_hotkey: "<f9>".to_string(),
            improve_hotkey: "<f10>".to_string(),
            pause_hotkey: None,
            pause_media: true,
            language: None,
            transcription_timeout_secs: 30,
            recording_focus_policy: RecordingFocusPolicy::Log,
            focus_poll_ms: 150,
        }
    }
}

/// Humanized typing cadence.
///
/// Factors are multiples of the base inter-character delay derived from
/// `wpm` (five characters per word).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    pub wpm: f64,
    pub jitter_min: f64,
    pub jitter_max: f64,
    pub punctuation_pause_min: f64,
    pub punctuation_pause_max: f64,
    /// Insert a hesitation every N characters, N drawn from this range.
    /// Zero disables hesitations.
    pub hesitation_every_min: u32,
    pub hesitation_every_max: u32,
    pub hesitation_factor: f64,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            wpm: 40.0,
            jitter_min: 0.7,
            jitter_max: 1.3,
            punctuation_pause_min: 3.0,
            punctuation_pause_max: 5.0,
            hesitation_every_min: 12,
            hesitation_every_max: 30,
            hesitation_factor: 2.0,
        }
    }
}

/// Microphone capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target sample rate in Hz.
    pub sample_rate: u32,
    pub channels: u16,
    /// Device index or name substring. `None` selects the default device.
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            device: None,
        }
    }
}

/// External media player control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Shell-style command that pauses playback. Empty disables media control.
    pub pause_command: String,
    pub resume_command: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            pause_command: "playerctl pause".to_string(),
            resume_command: "playerctl play".to_string(),
        }
    }
}

/// Transcription backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Path to a GGML Whisper model. Empty means no local model.
    pub model_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = TypewispConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.dictation.record_mode, RecordMode::Toggle);
        assert!(config.dictation.auto_type);
        assert!(config.dictation.refocus_window);
        assert_eq!(config.dictation.hotkey, "<f8>");
        assert_eq!(config.dictation.type_hotkey, "<f9>");
        assert_eq!(config.dictation.improve_hotkey, "<f10>");
        assert_eq!(config.dictation.transcription_timeout_secs, 30);
        assert_eq!(config.typing.wpm, 40.0);
        assert_eq!(config.audio.sample_rate, 16000);
        assert!(config.transcription.model_path.is_empty());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[dictation]
record_mode = "hold"
auto_type = false
refocus_window = false
hotkey = "Ctrl+Alt+R"
type_hotkey = "<f7>"
improve_hotkey = "<f6>"
pause_hotkey = "<f12>"
language = "de"
transcription_timeout_secs = 10
recording_focus_policy = "abort"

[typing]
wpm = 90.0
jitter_min = 0.8
jitter_max = 1.2

[audio]
device = "USB"

[media]
pause_command = ""
"#;
        let file = create_temp_config(content);
        let config = TypewispConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.dictation.record_mode, RecordMode::Hold);
        assert!(!config.dictation.auto_type);
        assert!(!config.dictation.refocus_window);
        assert_eq!(config.dictation.hotkey, "Ctrl+Alt+R");
        assert_eq!(config.dictation.pause_hotkey.as_deref(), Some("<f12>"));
        assert_eq!(config.dictation.language.as_deref(), Some("de"));
        assert_eq!(
            config.dictation.recording_focus_policy,
            RecordingFocusPolicy::Abort
        );
        assert_eq!(config.typing.wpm, 90.0);
        // Unspecified typing fields keep their defaults.
        assert_eq!(config.typing.punctuation_pause_min, 3.0);
        assert_eq!(config.audio.device.as_deref(), Some("USB"));
        assert!(config.media.pause_command.is_empty());
        assert_eq!(config.media.resume_command, "playerctl play");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = TypewispConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.dictation.hotkey, "<f8>");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = TypewispConfig::load(file.path());
        assert!(matches!(result, Err(TypewispError::Config(_))));
    }

    #[test]
    fn test_load_unknown_record_mode_fails() {
        let file = create_temp_config("[dictation]\nrecord_mode = \"sometimes\"\n");
        assert!(TypewispConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = TypewispConfig::load(file.path()).unwrap();
        assert_eq!(config.dictation.record_mode, RecordMode::Toggle);
        assert_eq!(config.typing.hesitation_every_max, 30);
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = TypewispConfig::default();
        config.dictation.auto_type = false;
        config.dictation.language = Some("en".to_string());
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = TypewispConfig::load(&path).unwrap();
        assert!(!reloaded.dictation.auto_type);
        assert_eq!(reloaded.dictation.language.as_deref(), Some("en"));
        assert_eq!(reloaded.media.pause_command, "playerctl pause");
    }
}
