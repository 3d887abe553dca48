//! End-to-end tests for the recording orchestrator.
//!
//! Every test drives a real orchestrator loop with in-memory collaborators:
//! a mock input capability for hotkeys, focus and keystrokes, a mock
//! microphone, a scripted transcriber and a recording media controller.
//! Time is paused, so typing delays and timeouts complete instantly.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;

use typewisp_audio::{AudioCaptureSession, MockAudioInput};
use typewisp_core::config::TypewispConfig;
use async_trait::async_trait;
use typewisp_audio::RecordedAudio;
use typewisp_core::error::{InjectionError, Result, TranscriptionError};
use typewisp_core::types::{RecordMode, RecordingFocusPolicy, StatusSignal, WindowId};
use typewisp_dictation::{
    Collaborators, DictationEvent, DictationSettings, EventSender, HotkeyBindings, HotkeyRole,
    InputCapability, MockInputCapability,
    MockTextImprover, OrchestratorHandle, RecordingMediaController, RecordingOrchestrator,
    StatusStream, TextImprover, UnavailableInput,
};
use typewisp_transcribe::{
    MockTranscriber, ScriptedTranscriber, TranscriptionAdapter, TranscriptionResult,
};

use StatusSignal::{Paused, Processing, Ready, Recording, Typing};

// =============================================================================
// Helpers
// =============================================================================

struct Rig {
    config: TypewispConfig,
    input: MockInputCapability,
    mic: MockAudioInput,
    improver: Option<Arc<dyn TextImprover>>,
    keyboard_breaks_after: Option<usize>,
}

impl Rig {
    fn new() -> Self {
        Self {
            config: TypewispConfig::default(),
            input: MockInputCapability::new().with_foreground("editor"),
            mic: MockAudioInput::tone(0.5, 16000),
            improver: None,
            keyboard_breaks_after: None,
        }
    }

    /// Make keystroke injection panic once `n` characters are typed.
    fn keyboard_breaks_after(mut self, n: usize) -> Self {
        self.keyboard_breaks_after = Some(n);
        self
    }

    fn config(mut self, f: impl FnOnce(&mut TypewispConfig)) -> Self {
        f(&mut self.config);
        self
    }

    fn mic(mut self, mic: MockAudioInput) -> Self {
        self.mic = mic;
        self
    }

    fn improver(mut self, improver: MockTextImprover) -> Self {
        self.improver = Some(Arc::new(improver));
        self
    }

    async fn start(self, transcriber: impl TranscriptionAdapter + 'static) -> Harness {
        let media = RecordingMediaController::new();
        let settings = DictationSettings::from_config(&self.config).unwrap();
        let collaborators = Collaborators {
            input: match self.keyboard_breaks_after {
                Some(n) => Arc::new(BrokenKeyboard {
                    inner: self.input.clone(),
                    n,
                }),
                None => Arc::new(self.input.clone()),
            },
            audio: AudioCaptureSession::new(Arc::new(self.mic.clone())),
            transcriber: Arc::new(transcriber),
            media: Arc::new(media.clone()),
            improver: self.improver,
        };
        let (orchestrator, handle) = RecordingOrchestrator::new(collaborators, settings);
        let status = handle.subscribe_status();
        let task = tokio::spawn(orchestrator.run());

        let mut harness = Harness {
            input: self.input,
            mic: self.mic,
            media,
            handle,
            status,
            task,
        };
        harness.expect(&[Ready]).await;
        harness
    }
}

struct Harness {
    input: MockInputCapability,
    mic: MockAudioInput,
    media: RecordingMediaController,
    handle: OrchestratorHandle,
    status: StatusStream,
    task: JoinHandle<Result<()>>,
}

impl Harness {
    async fn expect(&mut self, expected: &[StatusSignal]) {
        for want in expected {
            let got = tokio::time::timeout(Duration::from_secs(300), self.status.next())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {want}"))
                .expect("status stream closed");
            assert_eq!(&got, want);
        }
    }

    /// No status change for `secs` of (virtual) time.
    async fn expect_quiet(&mut self, secs: u64) {
        let next = tokio::time::timeout(Duration::from_secs(secs), self.status.next()).await;
        assert!(next.is_err(), "unexpected status {next:?}");
    }

    fn press(&self, role: HotkeyRole) {
        assert!(self.input.press(role), "{role} hotkey not registered");
    }

    fn release(&self, role: HotkeyRole) {
        assert!(self.input.release(role), "{role} hotkey not registered");
    }

    async fn send(&self, event: DictationEvent) {
        self.handle.send(event).await.unwrap();
    }

    async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await.unwrap();
        self.task.await.unwrap()
    }
}

/// Keyboard backend that panics after `n` characters.
struct BrokenKeyboard {
    inner: MockInputCapability,
    n: usize,
}

impl InputCapability for BrokenKeyboard {
    fn register_hotkeys(&self, bindings: &HotkeyBindings, events: EventSender) -> Result<()> {
        self.inner.register_hotkeys(bindings, events)
    }
    fn unregister_hotkeys(&self) {
        self.inner.unregister_hotkeys()
    }
    fn subscribe_focus_changes(&self, events: EventSender) -> bool {
        self.inner.subscribe_focus_changes(events)
    }
    fn inject_keystroke(&self, ch: char) -> std::result::Result<(), InjectionError> {
        if self.inner.typed().chars().count() >= self.n {
            panic!("keyboard backend crashed");
        }
        self.inner.inject_keystroke(ch)
    }
    fn foreground_window(&self) -> Option<WindowId> {
        self.inner.foreground_window()
    }
    fn focus_window(&self, window: &WindowId) -> bool {
        self.inner.focus_window(window)
    }
}

/// Transcriber whose first call panics; later calls succeed.
#[derive(Default)]
struct CrashOnceTranscriber {
    crashed: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl TranscriptionAdapter for CrashOnceTranscriber {
    async fn transcribe(
        &self,
        _audio: RecordedAudio,
        _language: Option<String>,
    ) -> std::result::Result<TranscriptionResult, TranscriptionError> {
        if !self.crashed.swap(true, std::sync::atomic::Ordering::SeqCst) {
            panic!("decoder crashed");
        }
        Ok(TranscriptionResult::from_text("ok", 1.0))
    }
}

fn hello() -> ScriptedTranscriber {
    ScriptedTranscriber::new().then_text("hello world")
}

fn error(reason: &str) -> StatusSignal {
    StatusSignal::Error(reason.into())
}

// =============================================================================
// Full cycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_toggle_auto_type_full_cycle() {
    let transcriber = hello();
    let mut h = Rig::new().start(transcriber.clone()).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    h.press(HotkeyRole::Record);
    h.expect(&[Processing, Typing, Ready]).await;

    assert_eq!(h.input.typed(), "hello world");
    assert_eq!(transcriber.received(), vec![8000]);
    assert_eq!(h.mic.open_streams(), 0);
    assert!(h.input.focus_requests().is_empty());
    assert_eq!(h.handle.current_status(), Ready);
    assert_eq!(h.media.calls(), vec!["pause", "resume"]);

    h.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_hold_mode_release_stops_recording() {
    let mut h = Rig::new()
        .config(|c| c.dictation.record_mode = RecordMode::Hold)
        .start(hello())
        .await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    // Key repeat while held.
    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect_quiet(2).await;

    h.release(HotkeyRole::Record);
    h.expect(&[Processing, Typing, Ready]).await;
    assert_eq!(h.input.typed(), "hello world");
    assert_eq!(h.mic.opened_total(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_mode_ignores_release() {
    let mut h = Rig::new().start(hello()).await;

    h.press(HotkeyRole::Record);
    h.release(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    h.expect_quiet(2).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Processing, Typing, Ready]).await;
}

#[tokio::test(start_paused = true)]
async fn test_record_hotkey_ignored_while_session_in_flight() {
    let transcriber = hello().with_delay(Duration::from_secs(2));
    let mut h = Rig::new().start(transcriber.clone()).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing]).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Typing]).await;
    h.press(HotkeyRole::Record);
    h.expect(&[Ready]).await;

    assert_eq!(h.mic.opened_total(), 1);
    assert_eq!(transcriber.calls(), 1);
    assert_eq!(h.input.typed(), "hello world");

    // Back at Ready the next press starts a new session.
    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    assert_eq!(h.mic.opened_total(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_capture_for_any_hotkey_sequence() {
    for mode in [RecordMode::Hold, RecordMode::Toggle] {
        let mut rng = StdRng::seed_from_u64(7);
        let h = Rig::new()
            .config(|c| c.dictation.record_mode = mode)
            .start(MockTranscriber::new())
            .await;

        for _ in 0..200 {
            if rng.gen_bool(0.5) {
                h.press(HotkeyRole::Record);
            } else {
                h.release(HotkeyRole::Record);
            }
            tokio::time::sleep(Duration::from_millis(rng.gen_range(1..800))).await;
            assert!(h.mic.open_streams() <= 1, "{mode}: more than one open capture");
        }

        let mic = h.mic.clone();
        h.shutdown().await.unwrap();
        assert_eq!(mic.open_streams(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_empty_transcript_returns_to_ready() {
    let mut h = Rig::new()
        .start(ScriptedTranscriber::new().then_text("   "))
        .await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Ready]).await;
    assert_eq!(h.input.typed(), "");
}

#[tokio::test(start_paused = true)]
async fn test_media_untouched_when_disabled() {
    let mut h = Rig::new()
        .config(|c| c.dictation.pause_media = false)
        .start(hello())
        .await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Typing, Ready]).await;
    assert!(h.media.calls().is_empty());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_transcription_timeout_reports_error() {
    let transcriber = ScriptedTranscriber::new()
        .then_text("too late")
        .with_delay(Duration::from_secs(60));
    let mut h = Rig::new()
        .config(|c| c.dictation.transcription_timeout_secs = 1)
        .start(transcriber)
        .await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[
        Recording,
        Processing,
        error("transcription timed out after 1 seconds"),
        Ready,
    ])
    .await;

    h.expect_quiet(120).await;
    assert_eq!(h.input.typed(), "");

    // The next session starts normally.
    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
}

#[tokio::test(start_paused = true)]
async fn test_transcription_failure_reports_error() {
    let transcriber = ScriptedTranscriber::new()
        .then_error(TranscriptionError::ModelUnavailable("missing ggml file".into()));
    let mut h = Rig::new().start(transcriber).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[
        Recording,
        Processing,
        error("model unavailable: missing ggml file"),
        Ready,
    ])
    .await;
    assert_eq!(h.input.typed(), "");
}

#[tokio::test(start_paused = true)]
async fn test_transcriber_panic_reports_error() {
    let mut h = Rig::new().start(CrashOnceTranscriber::default()).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[
        Recording,
        Processing,
        error("transcription task failed"),
        Ready,
    ])
    .await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Typing, Ready]).await;
    assert_eq!(h.input.typed(), "ok");
}

#[tokio::test(start_paused = true)]
async fn test_typing_panic_returns_to_ready() {
    let transcriber = ScriptedTranscriber::new()
        .then_text("hello world")
        .then_text("again");
    let mut h = Rig::new()
        .keyboard_breaks_after(1)
        .start(transcriber)
        .await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Typing, Ready]).await;
    assert_eq!(h.input.typed(), "h");

    // Hotkeys still work after the crash.
    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    h.send(DictationEvent::Stop).await;
    h.expect(&[Ready]).await;
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_stays_ready() {
    let transcriber = hello();
    let mut h = Rig::new()
        .mic(MockAudioInput::unavailable("no microphone"))
        .start(transcriber.clone())
        .await;

    h.press(HotkeyRole::Record);
    h.expect(&[error("Capture error: no microphone"), Ready]).await;
    assert_eq!(transcriber.calls(), 0);
    assert!(h.media.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_registration_failure_ends_run() {
    let collaborators = Collaborators {
        input: Arc::new(UnavailableInput),
        audio: AudioCaptureSession::new(Arc::new(MockAudioInput::tone(0.5, 16000))),
        transcriber: Arc::new(hello()),
        media: Arc::new(RecordingMediaController::new()),
        improver: None,
    };
    let settings = DictationSettings::from_config(&TypewispConfig::default()).unwrap();
    let (orchestrator, handle) = RecordingOrchestrator::new(collaborators, settings);

    let err = orchestrator.run().await.unwrap_err();
    assert!(err.to_string().contains("no keyboard backend"));
    assert!(matches!(handle.current_status(), StatusSignal::Error(_)));
}

// =============================================================================
// Focus
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_focus_change_cancels_typing() {
    let mut h = Rig::new().start(hello()).await;
    h.input.switch_focus_after(3, "browser");

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Typing, Ready]).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.input.typed(), "hel");
    assert!(h.input.focus_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_refocus_target_before_typing() {
    let transcriber = hello().with_delay(Duration::from_secs(2));
    let mut h = Rig::new().start(transcriber).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing]).await;
    h.input.set_foreground("browser");

    h.expect(&[Typing, Ready]).await;
    assert_eq!(h.input.focus_requests(), vec![WindowId::new("editor")]);
    assert_eq!(h.input.typed(), "hello world");
}

#[tokio::test(start_paused = true)]
async fn test_no_typing_when_refocus_refused() {
    let input = MockInputCapability::new()
        .with_foreground("editor")
        .refusing_focus();
    let transcriber = hello().with_delay(Duration::from_secs(2));
    let mut rig = Rig::new();
    rig.input = input;
    let mut h = rig.start(transcriber).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing]).await;
    h.input.set_foreground("browser");

    h.expect(&[Typing, Ready]).await;
    assert_eq!(h.input.typed(), "");
}

#[tokio::test(start_paused = true)]
async fn test_focus_loss_while_recording_is_logged_by_default() {
    let mut h = Rig::new().start(hello()).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    h.input.set_foreground("browser");
    h.expect_quiet(2).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Processing, Typing, Ready]).await;
    assert_eq!(h.input.focus_requests(), vec![WindowId::new("editor")]);
    assert_eq!(h.input.typed(), "hello world");
}

#[tokio::test(start_paused = true)]
async fn test_focus_policy_abort_discards_recording() {
    let transcriber = hello();
    let mut h = Rig::new()
        .config(|c| c.dictation.recording_focus_policy = RecordingFocusPolicy::Abort)
        .start(transcriber.clone())
        .await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    h.input.set_foreground("browser");
    h.expect(&[Ready]).await;

    assert_eq!(h.mic.open_streams(), 0);
    assert_eq!(transcriber.calls(), 0);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.media.calls(), vec!["pause", "resume"]);
}

#[tokio::test(start_paused = true)]
async fn test_focus_policy_stop_transcribes_early() {
    let mut h = Rig::new()
        .config(|c| c.dictation.recording_focus_policy = RecordingFocusPolicy::Stop)
        .start(hello())
        .await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    h.input.set_foreground("browser");
    h.expect(&[Processing, Typing, Ready]).await;
    assert_eq!(h.input.typed(), "hello world");
}

#[tokio::test(start_paused = true)]
async fn test_focus_poller_used_without_focus_events() {
    let mut rig = Rig::new().config(|c| {
        c.dictation.recording_focus_policy = RecordingFocusPolicy::Abort;
        c.dictation.focus_poll_ms = 50;
    });
    rig.input = MockInputCapability::new()
        .with_foreground("editor")
        .without_focus_events();
    let mut h = rig.start(hello()).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    h.input.set_foreground("browser");
    h.expect(&[Ready]).await;
    assert_eq!(h.mic.open_streams(), 0);
}

// =============================================================================
// Staged transcripts
// =============================================================================

fn staged_rig() -> Rig {
    Rig::new().config(|c| c.dictation.auto_type = false)
}

#[tokio::test(start_paused = true)]
async fn test_transcript_staged_until_confirmed() {
    let mut h = staged_rig().start(hello()).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Ready]).await;
    assert_eq!(h.input.typed(), "");

    // Typed into whatever has focus at confirm time.
    h.input.set_foreground("notes");
    h.press(HotkeyRole::Type);
    h.expect(&[Typing, Ready]).await;
    assert_eq!(h.input.typed(), "hello world");
    assert!(h.input.focus_requests().is_empty());

    // Nothing left to type.
    h.press(HotkeyRole::Type);
    h.expect_quiet(5).await;
    assert_eq!(h.input.typed(), "hello world");
}

#[tokio::test(start_paused = true)]
async fn test_confirm_during_processing_types_when_ready() {
    let transcriber = hello().with_delay(Duration::from_secs(2));
    let mut h = staged_rig().start(transcriber).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing]).await;
    h.press(HotkeyRole::Type);

    h.expect(&[Ready, Typing, Ready]).await;
    assert_eq!(h.input.typed(), "hello world");
}

#[tokio::test(start_paused = true)]
async fn test_new_recording_clears_staged_transcript() {
    let mut h = staged_rig().start(hello()).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Ready]).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    h.send(DictationEvent::Stop).await;
    h.expect(&[Ready]).await;

    h.press(HotkeyRole::Type);
    h.expect_quiet(5).await;
    assert_eq!(h.input.typed(), "");
}

#[tokio::test(start_paused = true)]
async fn test_improve_rewrites_staged_text() {
    let improver = MockTextImprover::replacing_with("Hello, world.");
    let mut h = staged_rig().improver(improver.clone()).start(hello()).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Ready]).await;

    h.press(HotkeyRole::Improve);
    h.expect(&[Processing, Ready]).await;
    assert_eq!(improver.seen(), vec!["hello world".to_string()]);

    h.press(HotkeyRole::Type);
    h.expect(&[Typing, Ready]).await;
    assert_eq!(h.input.typed(), "Hello, world.");
}

#[tokio::test(start_paused = true)]
async fn test_improve_failure_keeps_original_text() {
    let improver = MockTextImprover::failing("service unreachable");
    let mut h = staged_rig().improver(improver).start(hello()).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Ready]).await;

    h.press(HotkeyRole::Improve);
    h.expect(&[
        Processing,
        error("Dictation error: service unreachable"),
        Ready,
    ])
    .await;

    h.press(HotkeyRole::Type);
    h.expect(&[Typing, Ready]).await;
    assert_eq!(h.input.typed(), "hello world");
}

#[tokio::test(start_paused = true)]
async fn test_improve_without_staged_text_is_ignored() {
    let improver = MockTextImprover::replacing_with("unused");
    let mut h = Rig::new().improver(improver.clone()).start(hello()).await;

    h.press(HotkeyRole::Improve);
    h.expect_quiet(5).await;
    assert!(improver.seen().is_empty());
}

// =============================================================================
// Commands
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_discards_recording() {
    let transcriber = hello();
    let mut h = Rig::new().start(transcriber.clone()).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    h.send(DictationEvent::Stop).await;
    h.expect(&[Ready]).await;

    assert_eq!(h.mic.open_streams(), 0);
    assert_eq!(transcriber.calls(), 0);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.media.calls(), vec!["pause", "resume"]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_drops_pending_transcript() {
    let transcriber = hello().with_delay(Duration::from_secs(5));
    let mut h = Rig::new().start(transcriber).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing]).await;
    h.send(DictationEvent::Stop).await;
    h.expect(&[Ready]).await;

    h.expect_quiet(10).await;
    assert_eq!(h.input.typed(), "");
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_typing() {
    let transcriber = ScriptedTranscriber::new().then_text("a rather long sentence to type out");
    let mut h = Rig::new().start(transcriber).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Typing]).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.send(DictationEvent::Stop).await;
    h.expect(&[Ready]).await;

    let typed = h.input.typed();
    assert!(!typed.is_empty());
    assert!(typed.len() < "a rather long sentence to type out".len());
}

#[tokio::test(start_paused = true)]
async fn test_pause_blocks_hotkeys_until_resumed() {
    let mut h = Rig::new().start(hello()).await;

    h.send(DictationEvent::Pause).await;
    h.expect(&[Paused]).await;
    h.press(HotkeyRole::Record);
    h.expect_quiet(2).await;
    assert_eq!(h.mic.opened_total(), 0);

    h.send(DictationEvent::Resume).await;
    h.expect(&[Ready]).await;
    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_aborts_recording() {
    let transcriber = hello();
    let mut h = Rig::new().start(transcriber.clone()).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;
    h.send(DictationEvent::Pause).await;
    h.expect(&[Paused]).await;
    assert_eq!(h.mic.open_streams(), 0);

    h.send(DictationEvent::Resume).await;
    h.expect(&[Ready]).await;
    assert_eq!(transcriber.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pause_cancels_typing() {
    let text = "a rather long sentence to type out";
    let transcriber = ScriptedTranscriber::new().then_text(text);
    let mut h = Rig::new().start(transcriber).await;

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Typing]).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.send(DictationEvent::TogglePause).await;
    h.expect(&[Paused]).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(h.input.typed().len() < text.len());

    h.send(DictationEvent::TogglePause).await;
    h.expect(&[Ready]).await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_hotkey_toggles() {
    let mut h = Rig::new()
        .config(|c| c.dictation.pause_hotkey = Some("<f12>".into()))
        .start(hello())
        .await;

    h.press(HotkeyRole::Pause);
    h.expect(&[Paused]).await;
    h.press(HotkeyRole::Record);
    h.expect_quiet(2).await;

    h.press(HotkeyRole::Pause);
    h.expect(&[Ready]).await;
}

#[tokio::test(start_paused = true)]
async fn test_reload_applies_to_next_session() {
    let transcriber = ScriptedTranscriber::new()
        .then_text("first")
        .then_text("second");
    let mut h = Rig::new().start(transcriber).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;

    let mut config = TypewispConfig::default();
    config.dictation.auto_type = false;
    config.dictation.hotkey = "Ctrl+Alt+D".into();
    h.handle
        .reload(DictationSettings::from_config(&config).unwrap())
        .await
        .unwrap();

    // The running session keeps the snapshot it started with.
    h.press(HotkeyRole::Record);
    h.expect(&[Processing, Typing, Ready]).await;
    assert_eq!(h.input.typed(), "first");

    let registered = h.input.registered().unwrap();
    assert_eq!(registered.record.to_string(), "Ctrl+Alt+D");

    h.press(HotkeyRole::Record);
    h.press(HotkeyRole::Record);
    h.expect(&[Recording, Processing, Ready]).await;
    assert_eq!(h.input.typed(), "first");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_everything() {
    let mut h = Rig::new().start(hello()).await;

    h.press(HotkeyRole::Record);
    h.expect(&[Recording]).await;

    let input = h.input.clone();
    let mic = h.mic.clone();
    let media = h.media.clone();
    h.shutdown().await.unwrap();

    assert_eq!(mic.open_streams(), 0);
    assert!(input.registered().is_none());
    assert_eq!(media.calls(), vec!["pause", "resume"]);
}
