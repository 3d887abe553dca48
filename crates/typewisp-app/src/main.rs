//! Typewisp application binary - composition root.
//!
//! 1. Parse the CLI and load configuration from TOML
//! 2. Validate it into a dictation settings snapshot (exit on error)
//! 3. Build the input, audio, transcription and media collaborators
//! 4. Run the recording orchestrator until quit or Ctrl+C

mod cli;
mod console;
#[cfg(feature = "desktop")]
mod desktop;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use typewisp_audio::AudioCaptureSession;
use typewisp_core::config::{AudioConfig, MediaConfig, TranscriptionConfig, TypewispConfig};
use typewisp_core::error::Result;
use typewisp_dictation::{
    Collaborators, CommandMediaController, DictationSettings, InputCapability, MediaController,
    NoopMediaController, RecordingOrchestrator,
};
use typewisp_transcribe::{MockTranscriber, TranscriptionAdapter};

use cli::{Backend, CliArgs};
use console::ConsoleInput;

/// A missing file means defaults; an unreadable or malformed one is an error.
fn read_config(path: &Path) -> Result<TypewispConfig> {
    if path.exists() {
        TypewispConfig::load(path)
    } else {
        Ok(TypewispConfig::default())
    }
}

/// Re-read and validate the configuration, for `reload`.
fn load_settings(args: &CliArgs, path: &Path) -> Result<DictationSettings> {
    let mut config = read_config(path)?;
    args.apply_overrides(&mut config);
    DictationSettings::from_config(&config)
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_input(backend: Backend) -> Result<(Arc<dyn InputCapability>, Option<Arc<ConsoleInput>>)> {
    match backend {
        Backend::Console => {
            let console = Arc::new(ConsoleInput::new());
            let input: Arc<dyn InputCapability> = console.clone();
            Ok((input, Some(console)))
        }
        #[cfg(feature = "desktop")]
        Backend::Desktop => {
            let input: Arc<dyn InputCapability> = Arc::new(desktop::DesktopInput::new()?);
            Ok((input, None))
        }
        #[cfg(not(feature = "desktop"))]
        Backend::Desktop => Err(typewisp_core::error::TypewispError::Config(
            "the desktop backend needs a build with `--features desktop`".into(),
        )),
    }
}

fn build_audio(config: &AudioConfig) -> AudioCaptureSession {
    #[cfg(feature = "cpal")]
    {
        tracing::info!(device = ?config.device, sample_rate = config.sample_rate, "Using microphone");
        AudioCaptureSession::new(Arc::new(typewisp_audio::CpalInput::new(config.clone())))
    }
    #[cfg(not(feature = "cpal"))]
    {
        tracing::info!("Built without the cpal feature, using a simulated microphone");
        AudioCaptureSession::new(Arc::new(typewisp_audio::MockAudioInput::tone(
            2.0,
            config.sample_rate,
        )))
    }
}

fn build_transcriber(config: &TranscriptionConfig) -> Arc<dyn TranscriptionAdapter> {
    let model_path = config.model_path.trim();

    #[cfg(feature = "whisper")]
    if !model_path.is_empty() {
        match typewisp_transcribe::WhisperTranscriber::load(model_path) {
            Ok(whisper) => {
                tracing::info!(model = %model_path, "Whisper model loaded");
                return Arc::new(whisper);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Whisper unavailable, using mock transcriber")
            }
        }
    }
    #[cfg(not(feature = "whisper"))]
    if !model_path.is_empty() {
        tracing::warn!(model = %model_path, "Built without the whisper feature, ignoring model_path");
    }

    Arc::new(MockTranscriber::new())
}

fn build_media(config: &MediaConfig) -> Arc<dyn MediaController> {
    let command = CommandMediaController::from_config(config);
    if command.is_enabled() {
        Arc::new(command)
    } else {
        tracing::info!("Media control disabled");
        Arc::new(NoopMediaController)
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_path = args.resolve_config_path();

    // Read before tracing starts so the file's log level applies.
    let loaded = read_config(&config_path);
    let level = args.resolve_log_level(
        loaded
            .as_ref()
            .map(|c| c.general.log_level.as_str())
            .unwrap_or("info"),
    );
    init_tracing(&level);

    tracing::info!("Starting Typewisp v{}", env!("CARGO_PKG_VERSION"));

    let mut config = loaded.map_err(|e| {
        tracing::error!(path = %config_path.display(), error = %e, "Could not load configuration");
        e
    })?;
    args.apply_overrides(&mut config);
    let settings = DictationSettings::from_config(&config).map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        e
    })?;
    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_path.display(), "No configuration file, using defaults");
    }

    let (input, console) = build_input(args.backend)?;
    let collaborators = Collaborators {
        input,
        audio: build_audio(&config.audio),
        transcriber: build_transcriber(&config.transcription),
        media: build_media(&config.media),
        improver: None,
    };
    let (orchestrator, handle) = RecordingOrchestrator::new(collaborators, settings);

    // Stands in for the tray icon.
    let mut status = handle.subscribe_status();
    tokio::spawn(async move {
        while let Some(signal) = status.next().await {
            tracing::info!(status = %signal, "Status");
        }
    });

    let interrupt = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            let _ = interrupt.shutdown().await;
        }
    });

    if let Some(console) = console {
        let handle = handle.clone();
        let args = args.clone();
        let path = config_path.clone();
        tokio::spawn(async move {
            let reload = move || load_settings(&args, &path);
            if let Err(e) = console::run(console, handle, reload).await {
                tracing::warn!(error = %e, "Console input stopped");
            }
        });
    }

    orchestrator.run().await?;
    tracing::info!("Typewisp stopped");
    Ok(())
}
