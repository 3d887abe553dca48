//! The recording orchestrator.
//!
//! A single task owns all dictation state and handles one event at a time
//! from a bounded queue. Long-running work (transcription, typing, text
//! improvement, media commands) runs on separate tasks that report back
//! through the same queue, tagged with the id of the session or job they
//! belong to so late results from a superseded session are discarded.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use typewisp_audio::AudioCaptureSession;
use typewisp_core::error::{Result, TranscriptionError};
use typewisp_core::types::{RecordMode, RecordingFocusPolicy, StatusSignal, WindowId};
use typewisp_transcribe::{TranscriptionAdapter, TranscriptionResult};

use crate::capability::InputCapability;
use crate::events::{DictationEvent, EventSender, EVENT_QUEUE_CAPACITY};
use crate::focus::{spawn_focus_poller, FocusGuard};
use crate::hotkey::HotkeyRole;
use crate::improve::TextImprover;
use crate::media::{MediaController, MediaHandle, MediaWorker};
use crate::session::{Session, StagedTranscript};
use crate::settings::DictationSettings;
use crate::state::{DictationState, StateMachine};
use crate::status::{StatusPublisher, StatusReader, StatusStream};
use crate::typing::{TypingEmulator, TypingJob, TypingOutcome, TypingReport};

/// External components the orchestrator drives.
pub struct Collaborators {
    pub input: Arc<dyn InputCapability>,
    pub audio: AudioCaptureSession,
    pub transcriber: Arc<dyn TranscriptionAdapter>,
    pub media: Arc<dyn MediaController>,
    pub improver: Option<Arc<dyn TextImprover>>,
}

/// Cloneable control surface for tray, console and tests.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    events: EventSender,
    status: StatusReader,
}

impl OrchestratorHandle {
    /// Sender for input backends and other event producers.
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    /// Enqueue without waiting; false if the event was dropped.
    pub fn emit(&self, event: DictationEvent) -> bool {
        self.events.emit(event)
    }

    pub async fn send(&self, event: DictationEvent) -> Result<()> {
        self.events.send(event).await
    }

    pub fn subscribe_status(&self) -> StatusStream {
        self.status.subscribe()
    }

    /// Latest published status.
    pub fn current_status(&self) -> StatusSignal {
        self.status.current()
    }

    /// Use `settings` from the next session on.
    pub async fn reload(&self, settings: DictationSettings) -> Result<()> {
        self.send(DictationEvent::Reload(Arc::new(settings))).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(DictationEvent::Shutdown).await
    }
}

struct ActiveTyping {
    job_id: Uuid,
    cancel: CancellationToken,
    target_window: Option<WindowId>,
    refocus_after: bool,
    /// Staged transcript being confirmed; restored if the job does not
    /// complete.
    staged: Option<StagedTranscript>,
}

pub struct RecordingOrchestrator {
    input: Arc<dyn InputCapability>,
    audio: AudioCaptureSession,
    transcriber: Arc<dyn TranscriptionAdapter>,
    improver: Option<Arc<dyn TextImprover>>,
    media: MediaHandle,
    media_worker: Option<MediaWorker>,
    settings: Arc<DictationSettings>,
    state: StateMachine,
    paused: bool,
    session: Option<Session>,
    typing: Option<ActiveTyping>,
    staged: Option<StagedTranscript>,
    pending_confirm: bool,
    improving: Option<Uuid>,
    focus_guard: FocusGuard,
    poller: Option<CancellationToken>,
    rx: mpsc::Receiver<DictationEvent>,
    events: EventSender,
    status: StatusPublisher,
}

impl RecordingOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        settings: DictationSettings,
    ) -> (Self, OrchestratorHandle) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let events = EventSender::new(tx);
        let status = StatusPublisher::new();
        let (media, media_worker) = MediaWorker::new(collaborators.media);

        let handle = OrchestratorHandle {
            events: events.clone(),
            status: status.reader(),
        };

        let orchestrator = Self {
            input: collaborators.input,
            audio: collaborators.audio,
            transcriber: collaborators.transcriber,
            improver: collaborators.improver,
            media,
            media_worker: Some(media_worker),
            settings: Arc::new(settings),
            state: StateMachine::new(),
            paused: false,
            session: None,
            typing: None,
            staged: None,
            pending_confirm: false,
            improving: None,
            focus_guard: FocusGuard::new(),
            poller: None,
            rx,
            events,
            status,
        };
        (orchestrator, handle)
    }

    /// Register hotkeys, publish `Ready` and process events until shutdown.
    ///
    /// Fails only if hotkey registration is refused at startup.
    pub async fn run(mut self) -> Result<()> {
        let media_task = self.media_worker.take().map(MediaWorker::spawn);

        if let Err(e) = self
            .input
            .register_hotkeys(&self.settings.bindings, self.events.clone())
        {
            tracing::error!(error = %e, "Hotkey registration failed");
            self.status.publish(StatusSignal::Error(e.to_string()));
            return Err(e);
        }
        self.watch_focus();

        tracing::info!(
            record = %self.settings.bindings.record,
            confirm = %self.settings.bindings.type_text,
            mode = %self.settings.record_mode,
            auto_type = self.settings.auto_type,
            "Dictation ready"
        );
        self.status.publish(StatusSignal::Ready);

        while let Some(event) = self.rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        self.shutdown();
        // Dropping the last media handle lets the worker drain and exit.
        drop(self);
        if let Some(task) = media_task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Media worker panicked");
            }
        }
        Ok(())
    }

    /// Returns false when the loop should end.
    fn handle_event(&mut self, event: DictationEvent) -> bool {
        match event {
            DictationEvent::HotkeyDown(role) => self.on_hotkey_down(role),
            DictationEvent::HotkeyUp(role) => self.on_hotkey_up(role),
            DictationEvent::FocusChanged(window) => self.on_focus_changed(window),
            DictationEvent::Pause => self.set_paused(true),
            DictationEvent::Resume => self.set_paused(false),
            DictationEvent::TogglePause => self.set_paused(!self.paused),
            DictationEvent::Stop => self.stop(),
            DictationEvent::Reload(settings) => self.reload(settings),
            DictationEvent::Shutdown => return false,
            DictationEvent::TranscriptReady { session_id, result } => {
                self.on_transcript(session_id, result)
            }
            DictationEvent::TranscriptionFailed { session_id, error } => {
                self.on_transcription_failed(session_id, error)
            }
            DictationEvent::TypingFinished(report) => self.on_typing_finished(report),
            DictationEvent::ImproveFinished { request_id, result } => {
                self.on_improve_finished(request_id, result)
            }
        }
        true
    }

    // =========================================================================
    // Hotkeys
    // =========================================================================

    fn on_hotkey_down(&mut self, role: HotkeyRole) {
        if self.paused {
            if role == HotkeyRole::Pause {
                self.set_paused(false);
            } else {
                tracing::debug!(%role, "Paused, ignoring hotkey");
            }
            return;
        }

        match role {
            HotkeyRole::Record => match self.state.current() {
                DictationState::Idle => self.start_recording(),
                DictationState::Recording => {
                    if self.session_mode() == Some(RecordMode::Toggle) {
                        self.finish_recording();
                    }
                }
                state => tracing::debug!(%state, "Session in flight, ignoring record hotkey"),
            },
            HotkeyRole::Type => self.confirm(),
            HotkeyRole::Improve => self.start_improve(),
            HotkeyRole::Pause => self.set_paused(true),
        }
    }

    fn on_hotkey_up(&mut self, role: HotkeyRole) {
        if self.paused || role != HotkeyRole::Record {
            return;
        }
        if self.state.current() == DictationState::Recording
            && self.session_mode() == Some(RecordMode::Hold)
        {
            self.finish_recording();
        }
    }

    fn session_mode(&self) -> Option<RecordMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    // =========================================================================
    // Recording
    // =========================================================================

    fn start_recording(&mut self) {
        let settings = Arc::clone(&self.settings);

        let capture = match self.audio.start() {
            Ok(capture) => capture,
            Err(e) => {
                tracing::warn!(error = %e, "Could not start recording");
                self.publish(StatusSignal::Error(e.to_string()));
                self.publish(StatusSignal::Ready);
                return;
            }
        };

        self.staged = None;
        self.pending_confirm = false;

        let target = self.input.foreground_window();
        if settings.pause_media {
            self.media.pause();
        }

        let session = Session::new(settings, target.clone(), capture);
        tracing::info!(
            session_id = %session.id,
            mode = %session.mode,
            target = ?target,
            "Recording started"
        );
        self.focus_guard.arm(target);
        self.session = Some(session);
        self.enter(DictationState::Recording);
    }

    /// Recording -> Processing.
    fn finish_recording(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(audio) = session.finalize_audio() else {
            return;
        };
        let session_id = session.id;
        let settings = Arc::clone(&session.settings);
        let elapsed_secs = session.elapsed_secs();

        if settings.pause_media {
            self.media.resume();
        }
        self.focus_guard.disarm();

        if audio.is_empty() {
            tracing::info!(session_id = %session_id, "No audio captured");
            self.session = None;
            self.enter(DictationState::Idle);
            return;
        }

        tracing::info!(
            session_id = %session_id,
            elapsed_secs,
            audio_secs = audio.duration_secs(),
            "Recording finished, transcribing"
        );
        self.enter(DictationState::Processing);

        let transcriber = Arc::clone(&self.transcriber);
        let events = self.events.clone();
        let timeout = settings.transcription_timeout;
        let language = settings.language.clone();
        tokio::spawn(async move {
            let work = tokio::spawn(async move {
                tokio::time::timeout(timeout, transcriber.transcribe(audio, language)).await
            });
            let outcome = match work.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => Err(TranscriptionError::Timeout(timeout.as_secs())),
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "Transcription task failed");
                    Err(TranscriptionError::Other("transcription task failed".into()))
                }
            };
            let event = match outcome {
                Ok(result) => DictationEvent::TranscriptReady { session_id, result },
                Err(error) => DictationEvent::TranscriptionFailed { session_id, error },
            };
            if events.send(event).await.is_err() {
                tracing::debug!(session_id = %session_id, "Orchestrator gone before transcript");
            }
        });
    }

    /// Recording -> Idle, discarding audio.
    fn abort_recording(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.abort_audio();
            if session.settings.pause_media {
                self.media.resume();
            }
            tracing::info!(session_id = %session.id, "Recording discarded");
        }
        self.focus_guard.disarm();
        self.enter(DictationState::Idle);
    }

    fn is_current_session(&self, session_id: Uuid) -> bool {
        self.state.current() == DictationState::Processing
            && self.session.as_ref().is_some_and(|s| s.id == session_id)
    }

    fn on_transcript(&mut self, session_id: Uuid, result: TranscriptionResult) {
        if !self.is_current_session(session_id) {
            tracing::debug!(session_id = %session_id, "Discarding transcript of superseded session");
            return;
        }
        let Some(session) = self.session.take() else {
            return;
        };

        let text = result.text.trim().to_string();
        if text.is_empty() {
            tracing::info!(session_id = %session_id, "No text transcribed");
            self.pending_confirm = false;
            self.enter(DictationState::Idle);
            return;
        }
        tracing::info!(
            session_id = %session_id,
            chars = text.chars().count(),
            language = ?result.language,
            "Transcript ready"
        );

        if session.settings.auto_type && !self.paused {
            let refocus = session.settings.refocus_window;
            self.pending_confirm = false;
            self.begin_typing(
                &text,
                session.target_window.clone(),
                &session.settings,
                refocus,
                None,
            );
            return;
        }

        self.staged = Some(StagedTranscript {
            session_id,
            text,
            settings: Arc::clone(&session.settings),
        });
        tracing::info!(session_id = %session_id, "Transcript staged, press the type hotkey to insert it");
        self.enter(DictationState::Idle);

        if std::mem::take(&mut self.pending_confirm) && !self.paused {
            self.confirm();
        }
    }

    fn on_transcription_failed(&mut self, session_id: Uuid, error: TranscriptionError) {
        if !self.is_current_session(session_id) {
            tracing::debug!(session_id = %session_id, error = %error, "Ignoring failure of superseded session");
            return;
        }
        self.session = None;
        self.pending_confirm = false;
        self.fail(error.to_string());
    }

    // =========================================================================
    // Typing
    // =========================================================================

    /// Type the staged transcript, or queue the request while a transcript
    /// that will be staged is still being produced.
    fn confirm(&mut self) {
        match self.state.current() {
            DictationState::Idle => {
                let Some(staged) = self.staged.take() else {
                    tracing::info!("No pending text to type");
                    return;
                };
                let target = self.input.foreground_window();
                let text = staged.text.clone();
                let settings = Arc::clone(&staged.settings);
                self.begin_typing(&text, target, &settings, false, Some(staged));
            }
            DictationState::Processing
                if self.session.as_ref().is_some_and(|s| !s.settings.auto_type) =>
            {
                tracing::debug!("Type requested while processing, typing once staged");
                self.pending_confirm = true;
            }
            state => tracing::debug!(%state, "Ignoring type hotkey"),
        }
    }

    fn begin_typing(
        &mut self,
        text: &str,
        target: Option<WindowId>,
        settings: &DictationSettings,
        refocus: bool,
        staged: Option<StagedTranscript>,
    ) {
        if refocus {
            if let Some(window) = target.as_ref() {
                self.refocus(window);
            }
        }

        let job = TypingJob::new(text, target.clone());
        let cancel = CancellationToken::new();
        tracing::info!(job_id = %job.id, chars = job.len(), target = ?target, "Typing started");

        self.focus_guard.arm(target.clone());
        self.typing = Some(ActiveTyping {
            job_id: job.id,
            cancel: cancel.clone(),
            target_window: target,
            refocus_after: refocus,
            staged,
        });
        TypingEmulator::new(Arc::clone(&self.input), settings.typing.clone()).spawn(
            job,
            cancel,
            self.events.clone(),
        );
        self.enter(DictationState::Typing);
    }

    fn on_typing_finished(&mut self, report: TypingReport) {
        if self.typing.as_ref().map(|t| t.job_id) != Some(report.job_id) {
            tracing::debug!(job_id = %report.job_id, "Ignoring report of unknown typing job");
            return;
        }
        let Some(active) = self.typing.take() else {
            return;
        };
        self.focus_guard.disarm();

        match report.outcome {
            TypingOutcome::Completed => {
                if active.refocus_after {
                    if let Some(window) = active.target_window.as_ref() {
                        self.refocus(window);
                    }
                }
            }
            TypingOutcome::Cancelled | TypingOutcome::FocusLost => {
                tracing::info!(outcome = ?report.outcome, typed = report.cursor, "Typing stopped early");
                if let Some(staged) = active.staged {
                    self.staged.get_or_insert(staged);
                }
            }
        }
        self.enter(DictationState::Idle);
    }

    fn refocus(&self, window: &WindowId) {
        if self.input.foreground_window().as_ref() == Some(window) {
            return;
        }
        if self.input.focus_window(window) {
            tracing::debug!(window = %window, "Refocused target window");
        } else {
            tracing::warn!(window = %window, "Could not refocus target window");
        }
    }

    fn on_focus_changed(&mut self, window: WindowId) {
        if !self.focus_guard.observe(&window) {
            return;
        }
        match self.state.current() {
            DictationState::Recording => {
                let policy = self
                    .session
                    .as_ref()
                    .map(|s| s.settings.recording_focus_policy)
                    .unwrap_or_default();
                match policy {
                    RecordingFocusPolicy::Ignore => {}
                    RecordingFocusPolicy::Log => {
                        tracing::info!(window = %window, "Focus left target window while recording")
                    }
                    RecordingFocusPolicy::Stop => {
                        tracing::info!(window = %window, "Focus left target window, stopping recording");
                        self.finish_recording();
                    }
                    RecordingFocusPolicy::Abort => {
                        tracing::info!(window = %window, "Focus left target window, discarding recording");
                        self.abort_recording();
                    }
                }
            }
            DictationState::Typing => {
                if let Some(active) = self.typing.as_ref() {
                    tracing::info!(window = %window, job_id = %active.job_id, "Focus left target window, cancelling typing");
                    active.cancel.cancel();
                }
            }
            _ => {}
        }
    }

    // =========================================================================
    // Improve
    // =========================================================================

    fn start_improve(&mut self) {
        if self.state.current() != DictationState::Idle {
            tracing::debug!(state = %self.state.current(), "Ignoring improve hotkey");
            return;
        }
        let Some(improver) = self.improver.clone() else {
            tracing::info!("No text improver configured");
            return;
        };
        let Some(staged) = self.staged.as_ref() else {
            tracing::info!("No pending text to improve");
            return;
        };

        let request_id = Uuid::new_v4();
        let text = staged.text.clone();
        let timeout = staged.settings.transcription_timeout;
        let events = self.events.clone();
        tracing::info!(request_id = %request_id, chars = text.chars().count(), "Improving staged text");

        tokio::spawn(async move {
            let work = tokio::spawn(async move {
                tokio::time::timeout(timeout, improver.improve(text)).await
            });
            let result = match work.await {
                Ok(Ok(Ok(improved))) => Ok(improved),
                Ok(Ok(Err(e))) => Err(e.to_string()),
                Ok(Err(_)) => Err(format!(
                    "text improvement timed out after {} seconds",
                    timeout.as_secs()
                )),
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Improve task failed");
                    Err("text improvement failed".to_string())
                }
            };
            let event = DictationEvent::ImproveFinished { request_id, result };
            if events.send(event).await.is_err() {
                tracing::debug!(request_id = %request_id, "Orchestrator gone before improvement");
            }
        });

        self.improving = Some(request_id);
        self.enter(DictationState::Improving);
    }

    fn on_improve_finished(&mut self, request_id: Uuid, result: std::result::Result<String, String>) {
        if self.improving != Some(request_id) {
            tracing::debug!(request_id = %request_id, "Ignoring stale improvement");
            return;
        }
        self.improving = None;

        match result {
            Ok(improved) => {
                let improved = improved.trim().to_string();
                if let Some(staged) = self.staged.as_mut().filter(|_| !improved.is_empty()) {
                    tracing::info!(chars = improved.chars().count(), "Staged text improved");
                    staged.text = improved;
                }
                self.enter(DictationState::Idle);
            }
            Err(reason) => self.fail(reason),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn stop(&mut self) {
        match self.state.current() {
            DictationState::Recording => self.abort_recording(),
            DictationState::Processing => {
                if let Some(session) = self.session.take() {
                    tracing::info!(session_id = %session.id, "Transcription superseded by stop");
                }
                self.pending_confirm = false;
                self.enter(DictationState::Idle);
            }
            DictationState::Typing => {
                if let Some(active) = self.typing.as_ref() {
                    tracing::info!(job_id = %active.job_id, "Typing stopped by user");
                    active.cancel.cancel();
                }
            }
            DictationState::Improving => {
                self.improving = None;
                self.enter(DictationState::Idle);
            }
            DictationState::Idle | DictationState::Error => tracing::debug!("Nothing to stop"),
        }
    }

    fn set_paused(&mut self, paused: bool) {
        if paused == self.paused {
            return;
        }
        self.paused = paused;

        if paused {
            match self.state.current() {
                DictationState::Recording => self.abort_recording(),
                DictationState::Typing => {
                    if let Some(active) = self.typing.as_ref() {
                        active.cancel.cancel();
                    }
                }
                _ => {}
            }
            self.pending_confirm = false;
            tracing::info!("Dictation paused");
            self.status.publish(StatusSignal::Paused);
        } else {
            tracing::info!("Dictation resumed");
            self.publish(self.state.current().status());
        }
    }

    fn reload(&mut self, settings: Arc<DictationSettings>) {
        self.input.unregister_hotkeys();
        if let Err(e) = self
            .input
            .register_hotkeys(&settings.bindings, self.events.clone())
        {
            tracing::warn!(error = %e, "New hotkeys rejected, keeping previous settings");
            if let Err(e) = self
                .input
                .register_hotkeys(&self.settings.bindings, self.events.clone())
            {
                tracing::error!(error = %e, "Could not restore previous hotkeys");
            }
            self.publish(StatusSignal::Error(e.to_string()));
            self.publish(self.state.current().status());
            return;
        }

        let poll_changed = settings.focus_poll_interval != self.settings.focus_poll_interval;
        self.settings = settings;
        if poll_changed {
            if let Some(poller) = self.poller.take() {
                poller.cancel();
                self.watch_focus();
            }
        }
        tracing::info!(
            mode = %self.settings.record_mode,
            auto_type = self.settings.auto_type,
            "Settings reloaded, applying from the next session"
        );
    }

    fn watch_focus(&mut self) {
        if self.input.subscribe_focus_changes(self.events.clone()) {
            tracing::debug!("Using focus change notifications");
            return;
        }
        let cancel = CancellationToken::new();
        spawn_focus_poller(
            Arc::clone(&self.input),
            self.settings.focus_poll_interval,
            self.events.clone(),
            cancel.clone(),
        );
        self.poller = Some(cancel);
    }

    fn shutdown(&mut self) {
        tracing::info!("Dictation shutting down");
        if self.state.current() == DictationState::Recording {
            self.abort_recording();
        }
        if let Some(active) = self.typing.take() {
            active.cancel.cancel();
        }
        if let Some(poller) = self.poller.take() {
            poller.cancel();
        }
        self.input.unregister_hotkeys();
    }

    // =========================================================================
    // State and status
    // =========================================================================

    /// Transition and publish the new state's status.
    fn enter(&mut self, next: DictationState) {
        if let Err(e) = self.state.transition(next) {
            tracing::error!(error = %e, "Rejected state change");
            return;
        }
        self.publish(next.status());
    }

    /// Publish `Error(reason)` and return to Idle.
    fn fail(&mut self, reason: String) {
        tracing::warn!(reason = %reason, state = %self.state.current(), "Dictation session failed");
        if self.state.current().is_busy() {
            if let Err(e) = self.state.transition(DictationState::Error) {
                tracing::error!(error = %e, "Rejected state change");
            }
        }
        self.publish(StatusSignal::Error(reason));
        if self.state.transition(DictationState::Idle).is_err() {
            self.state.reset();
        }
        self.publish(StatusSignal::Ready);
    }

    /// While paused the observable status stays `Paused`.
    fn publish(&self, signal: StatusSignal) {
        if self.paused {
            tracing::debug!(status = %signal, "Paused, status not published");
            return;
        }
        self.status.publish(signal);
    }
}
