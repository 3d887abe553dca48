//! CLI argument definitions for the Typewisp binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use typewisp_core::config::TypewispConfig;
use typewisp_core::types::RecordMode;

/// Typewisp: press a hotkey, speak, and have the words typed into the
/// focused window.
#[derive(Parser, Debug, Clone)]
#[command(name = "typewisp", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Override the configured record mode.
    #[arg(long = "record-mode", value_enum)]
    pub record_mode: Option<ModeArg>,

    /// Stage transcripts until the type hotkey is pressed.
    #[arg(long = "no-auto-type")]
    pub no_auto_type: bool,

    /// Where hotkeys come from and keystrokes go.
    #[arg(long = "backend", value_enum, default_value_t = Backend::Console)]
    pub backend: Backend,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Commands on stdin, typed text on stdout.
    Console,
    /// Global hotkeys and real keystrokes (needs the `desktop` feature).
    Desktop,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Hold,
    Toggle,
}

impl From<ModeArg> for RecordMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Hold => RecordMode::Hold,
            ModeArg::Toggle => RecordMode::Toggle,
        }
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TYPEWISP_CONFIG env var > ~/.typewisp/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TYPEWISP_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Apply flags that override config file values.
    pub fn apply_overrides(&self, config: &mut TypewispConfig) {
        if let Some(mode) = self.record_mode {
            config.dictation.record_mode = mode.into();
        }
        if self.no_auto_type {
            config.dictation.auto_type = false;
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".typewisp").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".typewisp").join("config.toml");
    }
    PathBuf::from("config.toml")
}
