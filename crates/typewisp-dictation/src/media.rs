//! Best-effort pause / resume of whatever media is playing.
//!
//! The orchestrator never waits on media commands. It pushes them onto an
//! ordered queue drained by a [`MediaWorker`] task, so a pause is always
//! applied before the matching resume. The worker only resumes playback it
//! paused itself.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use typewisp_core::config::MediaConfig;
use typewisp_core::error::{Result, TypewispError};

/// Result of a media command that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaOutcome {
    /// The command took effect.
    Applied,
    /// Nothing to do, e.g. no player was running.
    Ignored,
}

#[async_trait]
pub trait MediaController: Send + Sync {
    async fn pause(&self) -> Result<MediaOutcome>;
    async fn resume(&self) -> Result<MediaOutcome>;
}

/// Controller used when media control is disabled.
#[derive(Debug, Clone, Default)]
pub struct NoopMediaController;

#[async_trait]
impl MediaController for NoopMediaController {
    async fn pause(&self) -> Result<MediaOutcome> {
        Ok(MediaOutcome::Ignored)
    }

    async fn resume(&self) -> Result<MediaOutcome> {
        Ok(MediaOutcome::Ignored)
    }
}

/// Runs external commands such as `playerctl pause` / `playerctl play`.
///
/// A zero exit status counts as applied, a non-zero one as ignored (playerctl
/// exits 1 when no player is running).
#[derive(Debug, Clone)]
pub struct CommandMediaController {
    pause: Vec<String>,
    resume: Vec<String>,
}

impl CommandMediaController {
    pub fn from_config(config: &MediaConfig) -> Self {
        let split = |cmd: &str| cmd.split_whitespace().map(str::to_string).collect();
        Self {
            pause: split(&config.pause_command),
            resume: split(&config.resume_command),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.pause.is_empty()
    }

    async fn run(argv: &[String]) -> Result<MediaOutcome> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(MediaOutcome::Ignored);
        };
        let status = tokio::process::Command::new(program)
            .args(args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        if status.success() {
            Ok(MediaOutcome::Applied)
        } else {
            tracing::debug!(command = %program, ?status, "Media command had no effect");
            Ok(MediaOutcome::Ignored)
        }
    }
}

#[async_trait]
impl MediaController for CommandMediaController {
    async fn pause(&self) -> Result<MediaOutcome> {
        Self::run(&self.pause).await
    }

    async fn resume(&self) -> Result<MediaOutcome> {
        Self::run(&self.resume).await
    }
}

/// Test controller that records every call.
#[derive(Debug, Clone)]
pub struct RecordingMediaController {
    calls: Arc<Mutex<Vec<&'static str>>>,
    pause_outcome: std::result::Result<MediaOutcome, String>,
}

impl Default for RecordingMediaController {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingMediaController {
    /// Pauses succeed.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            pause_outcome: Ok(MediaOutcome::Applied),
        }
    }

    /// Pauses report that nothing was playing.
    pub fn idle() -> Self {
        Self {
            pause_outcome: Ok(MediaOutcome::Ignored),
            ..Self::new()
        }
    }

    /// Pauses fail.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            pause_outcome: Err(reason.into()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl MediaController for RecordingMediaController {
    async fn pause(&self) -> Result<MediaOutcome> {
        self.record("pause");
        self.pause_outcome
            .clone()
            .map_err(TypewispError::Dictation)
    }

    async fn resume(&self) -> Result<MediaOutcome> {
        self.record("resume");
        Ok(MediaOutcome::Applied)
    }
}

// =============================================================================
// Worker
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaCommand {
    Pause,
    Resume,
}

/// Non-blocking handle used by the orchestrator.
#[derive(Debug, Clone)]
pub struct MediaHandle {
    tx: mpsc::UnboundedSender<MediaCommand>,
}

impl MediaHandle {
    pub fn pause(&self) {
        self.send(MediaCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(MediaCommand::Resume);
    }

    fn send(&self, command: MediaCommand) {
        if self.tx.send(command).is_err() {
            tracing::debug!(?command, "Media worker stopped, command dropped");
        }
    }
}

/// Drains media commands in order.
pub struct MediaWorker {
    controller: Arc<dyn MediaController>,
    rx: mpsc::UnboundedReceiver<MediaCommand>,
    paused_by_us: bool,
}

impl MediaWorker {
    pub fn new(controller: Arc<dyn MediaController>) -> (MediaHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MediaHandle { tx },
            Self {
                controller,
                rx,
                paused_by_us: false,
            },
        )
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                MediaCommand::Pause => {
                    if self.paused_by_us {
                        continue;
                    }
                    match self.controller.pause().await {
                        Ok(MediaOutcome::Applied) => {
                            tracing::debug!("Media paused");
                            self.paused_by_us = true;
                        }
                        Ok(MediaOutcome::Ignored) => tracing::debug!("Nothing to pause"),
                        Err(e) => tracing::warn!(error = %e, "Media pause failed"),
                    }
                }
                MediaCommand::Resume => {
                    if !self.paused_by_us {
                        continue;
                    }
                    self.paused_by_us = false;
                    match self.controller.resume().await {
                        Ok(_) => tracing::debug!("Media resumed"),
                        Err(e) => tracing::warn!(error = %e, "Media resume failed"),
                    }
                }
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
