//! Boundary to the OS keyboard and window system.
//!
//! One capability is created at process startup and shared by `Arc`. Its
//! callbacks only enqueue [`DictationEvent`]s; they never touch dictation
//! state directly.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use typewisp_core::error::{InjectionError, Result, TypewispError};
use typewisp_core::types::WindowId;

use crate::events::{DictationEvent, EventSender};
use crate::hotkey::{HotkeyBindings, HotkeyRole};

pub trait InputCapability: Send + Sync {
    /// Start delivering `HotkeyDown` / `HotkeyUp` events for every binding.
    /// Replaces any earlier registration.
    fn register_hotkeys(&self, bindings: &HotkeyBindings, events: EventSender) -> Result<()>;

    fn unregister_hotkeys(&self);

    /// Start delivering `FocusChanged` events. Returns false when the backend
    /// cannot observe focus changes, in which case the caller polls
    /// [`InputCapability::foreground_window`] instead.
    fn subscribe_focus_changes(&self, events: EventSender) -> bool;

    /// Type a single character into the focused window.
    fn inject_keystroke(&self, ch: char) -> std::result::Result<(), InjectionError>;

    /// Identity of the window that currently has input focus, if known.
    fn foreground_window(&self) -> Option<WindowId>;

    /// Bring a window to the front, restoring it if minimized. Returns false
    /// if the window no longer exists or refused focus.
    fn focus_window(&self, window: &WindowId) -> bool;
}

// =============================================================================
// Mock implementation
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    typed: String,
    foreground: Option<WindowId>,
    unsupported: HashSet<char>,
    failing: HashSet<char>,
    focus_requests: Vec<WindowId>,
    refuse_focus: bool,
    focus_events: bool,
    bindings: Option<HotkeyBindings>,
    hotkey_sender: Option<EventSender>,
    focus_sender: Option<EventSender>,
    switch_after: Option<(usize, WindowId)>,
}

/// In-memory capability for tests.
///
/// Records every injected character, lets tests move the foreground window
/// (emitting `FocusChanged` if focus events are subscribed), and can simulate
/// hotkey presses through the registered sender.
#[derive(Debug, Clone)]
pub struct MockInputCapability {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockInputCapability {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInputCapability {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                focus_events: true,
                ..MockState::default()
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        match self.state.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Set the initial foreground window.
    pub fn with_foreground(self, window: impl Into<String>) -> Self {
        self.with_state(|s| s.foreground = Some(WindowId::new(window)));
        self
    }

    /// Report focus subscriptions as unsupported, forcing the poller.
    pub fn without_focus_events(self) -> Self {
        self.with_state(|s| s.focus_events = false);
        self
    }

    /// Characters the backend reports as `Unsupported`.
    pub fn with_unsupported(self, chars: &str) -> Self {
        self.with_state(|s| s.unsupported.extend(chars.chars()));
        self
    }

    /// Characters the backend fails on with a `Backend` error.
    pub fn with_failing(self, chars: &str) -> Self {
        self.with_state(|s| s.failing.extend(chars.chars()));
        self
    }

    /// Make `focus_window` fail.
    pub fn refusing_focus(self) -> Self {
        self.with_state(|s| s.refuse_focus = true);
        self
    }

    /// Move focus to `window` right after the n-th injected character.
    pub fn switch_focus_after(&self, chars: usize, window: impl Into<String>) {
        self.with_state(|s| s.switch_after = Some((chars, WindowId::new(window))));
    }

    /// Everything typed so far.
    pub fn typed(&self) -> String {
        self.with_state(|s| s.typed.clone())
    }

    pub fn focus_requests(&self) -> Vec<WindowId> {
        self.with_state(|s| s.focus_requests.clone())
    }

    pub fn registered(&self) -> Option<HotkeyBindings> {
        self.with_state(|s| s.bindings.clone())
    }

    /// Move the foreground window, as if the user clicked elsewhere.
    pub fn set_foreground(&self, window: impl Into<String>) {
        let window = WindowId::new(window);
        let sender = self.with_state(|s| {
            s.foreground = Some(window.clone());
            s.focus_sender.clone()
        });
        if let Some(sender) = sender {
            sender.emit(DictationEvent::FocusChanged(window));
        }
    }

    /// Simulate a physical key-down of the hotkey bound to `role`.
    pub fn press(&self, role: HotkeyRole) -> bool {
        self.send_hotkey(role, DictationEvent::HotkeyDown(role))
    }

    /// Simulate a physical key-up of the hotkey bound to `role`.
    pub fn release(&self, role: HotkeyRole) -> bool {
        self.send_hotkey(role, DictationEvent::HotkeyUp(role))
    }

    fn send_hotkey(&self, role: HotkeyRole, event: DictationEvent) -> bool {
        let sender = self.with_state(|s| {
            let bound = s
                .bindings
                .as_ref()
                .is_some_and(|b| b.iter().any(|(r, _)| r == role));
            if bound {
                s.hotkey_sender.clone()
            } else {
                None
            }
        });
        sender.is_some_and(|tx| tx.emit(event))
    }
}

impl InputCapability for MockInputCapability {
    fn register_hotkeys(&self, bindings: &HotkeyBindings, events: EventSender) -> Result<()> {
        self.with_state(|s| {
            s.bindings = Some(bindings.clone());
            s.hotkey_sender = Some(events);
        });
        Ok(())
    }

    fn unregister_hotkeys(&self) {
        self.with_state(|s| {
            s.bindings = None;
            s.hotkey_sender = None;
        });
    }

    fn subscribe_focus_changes(&self, events: EventSender) -> bool {
        self.with_state(|s| {
            if s.focus_events {
                s.focus_sender = Some(events);
            }
            s.focus_events
        })
    }

    fn inject_keystroke(&self, ch: char) -> std::result::Result<(), InjectionError> {
        let switched = self.with_state(|s| {
            if s.unsupported.contains(&ch) {
                return Err(InjectionError::Unsupported(ch));
            }
            if s.failing.contains(&ch) {
                return Err(InjectionError::Backend(format!("cannot send {ch:?}")));
            }
            s.typed.push(ch);

            let count = s.typed.chars().count();
            match s.switch_after.take() {
                Some((n, window)) if count >= n => {
                    s.foreground = Some(window.clone());
                    Ok(s.focus_sender.clone().map(|tx| (tx, window)))
                }
                pending => {
                    s.switch_after = pending;
                    Ok(None)
                }
            }
        })?;

        if let Some((tx, window)) = switched {
            tx.emit(DictationEvent::FocusChanged(window));
        }
        Ok(())
    }

    fn foreground_window(&self) -> Option<WindowId> {
        self.with_state(|s| s.foreground.clone())
    }

    fn focus_window(&self, window: &WindowId) -> bool {
        self.with_state(|s| {
            s.focus_requests.push(window.clone());
            if s.refuse_focus {
                false
            } else {
                s.foreground = Some(window.clone());
                true
            }
        })
    }
}

/// Capability that refuses hotkey registration, as when another program
/// already grabbed the key.
#[derive(Debug, Clone, Default)]
pub struct UnavailableInput;

impl InputCapability for UnavailableInput {
    fn register_hotkeys(&self, _bindings: &HotkeyBindings, _events: EventSender) -> Result<()> {
        Err(TypewispError::Dictation(
            "no keyboard backend available".into(),
        ))
    }

    fn unregister_hotkeys(&self) {}

    fn subscribe_focus_changes(&self, _events: EventSender) -> bool {
        false
    }

    fn inject_keystroke(&self, _ch: char) -> std::result::Result<(), InjectionError> {
        Err(InjectionError::Backend("no keyboard backend available".into()))
    }

    fn foreground_window(&self) -> Option<WindowId> {
        None
    }

    fn focus_window(&self, _window: &WindowId) -> bool {
        false
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use typewisp_core::config::DictationConfig;

    fn bindings() -> HotkeyBindings {
        HotkeyBindings::from_config(&DictationConfig::default()).unwrap()
    }

    #[test]
    fn test_mock_records_typed_chars() {
        let mock = MockInputCapability::new().with_unsupported("é").with_failing("#");
        mock.inject_keystroke('h').unwrap();
        mock.inject_keystroke('i').unwrap();
        assert_eq!(
            mock.inject_keystroke('é'),
            Err(InjectionError::Unsupported('é'))
        );
        assert!(matches!(
            mock.inject_keystroke('#'),
            Err(InjectionError::Backend(_))
        ));
        assert_eq!(mock.typed(), "hi");
    }

    #[test]
    fn test_mock_focus_window() {
        let mock = MockInputCapability::new().with_foreground("editor");
        assert_eq!(mock.foreground_window(), Some(WindowId::new("editor")));

        assert!(mock.focus_window(&WindowId::new("terminal")));
        assert_eq!(mock.foreground_window(), Some(WindowId::new("terminal")));
        assert_eq!(mock.focus_requests(), vec![WindowId::new("terminal")]);

        let refusing = MockInputCapability::new()
            .with_foreground("editor")
            .refusing_focus();
        assert!(!refusing.focus_window(&WindowId::new("terminal")));
        assert_eq!(refusing.foreground_window(), Some(WindowId::new("editor")));
    }

    #[tokio::test]
    async fn test_mock_press_requires_registration() {
        let mock = MockInputCapability::new();
        assert!(!mock.press(HotkeyRole::Record));

        let (tx, mut rx) = EventSender::channel(8);
        mock.register_hotkeys(&bindings(), tx).unwrap();
        assert!(mock.press(HotkeyRole::Record));
        assert!(mock.release(HotkeyRole::Record));
        // Pause has no binding by default.
        assert!(!mock.press(HotkeyRole::Pause));

        assert!(matches!(
            rx.recv().await,
            Some(DictationEvent::HotkeyDown(HotkeyRole::Record))
        ));
        assert!(matches!(
            rx.recv().await,
            Some(DictationEvent::HotkeyUp(HotkeyRole::Record))
        ));

        mock.unregister_hotkeys();
        assert!(mock.registered().is_none());
        assert!(!mock.press(HotkeyRole::Record));
    }

    #[tokio::test]
    async fn test_mock_focus_events() {
        let mock = MockInputCapability::new().with_foreground("editor");
        let (tx, mut rx) = EventSender::channel(8);
        assert!(mock.subscribe_focus_changes(tx));

        mock.set_foreground("browser");
        match rx.recv().await {
            Some(DictationEvent::FocusChanged(w)) => assert_eq!(w.as_str(), "browser"),
            other => panic!("unexpected event {other:?}"),
        }

        let polled = MockInputCapability::new().without_focus_events();
        let (tx, _rx) = EventSender::channel(8);
        assert!(!polled.subscribe_focus_changes(tx));
    }

    #[tokio::test]
    async fn test_mock_switch_focus_after() {
        let mock = MockInputCapability::new().with_foreground("editor");
        let (tx, mut rx) = EventSender::channel(8);
        mock.subscribe_focus_changes(tx);
        mock.switch_focus_after(2, "chat");

        mock.inject_keystroke('a').unwrap();
        assert_eq!(mock.foreground_window(), Some(WindowId::new("editor")));
        mock.inject_keystroke('b').unwrap();
        assert_eq!(mock.foreground_window(), Some(WindowId::new("chat")));
        assert!(matches!(
            rx.recv().await,
            Some(DictationEvent::FocusChanged(_))
        ));
    }

    #[test]
    fn test_unavailable_input_refuses_registration() {
        let (tx, _rx) = EventSender::channel(1);
        assert!(UnavailableInput.register_hotkeys(&bindings(), tx).is_err());
        assert!(UnavailableInput.foreground_window().is_none());
    }
}
