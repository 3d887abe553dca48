//! Desktop input backend: global hotkeys through `rdev`, keystrokes through
//! `enigo`.
//!
//! Neither library exposes window identity, so this backend reports no
//! foreground window and typing is not focus-guarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use enigo::{Enigo, Keyboard, Settings};
use rdev::{EventType, Key as RdevKey};
use tokio::runtime::{Handle, RuntimeFlavor};

use typewisp_core::error::{InjectionError, Result, TypewispError};
use typewisp_core::types::WindowId;
use typewisp_dictation::hotkey::{Hotkey, Key, Modifiers};
use typewisp_dictation::{
    DictationEvent, EventSender, HotkeyBindings, HotkeyRole, InputCapability,
};

type KeystrokeRequest = (char, std_mpsc::Sender<std::result::Result<(), InjectionError>>);

struct Registration {
    bindings: HotkeyBindings,
    events: EventSender,
}

pub struct DesktopInput {
    registration: Arc<Mutex<Option<Registration>>>,
    listening: AtomicBool,
    keyboard: Mutex<std_mpsc::Sender<KeystrokeRequest>>,
}

impl DesktopInput {
    /// Start the keyboard thread. The hotkey listener starts on first
    /// registration.
    pub fn new() -> Result<Self> {
        Ok(Self {
            registration: Arc::new(Mutex::new(None)),
            listening: AtomicBool::new(false),
            keyboard: Mutex::new(spawn_keyboard()?),
        })
    }

    fn registration(&self) -> MutexGuard<'_, Option<Registration>> {
        lock(&self.registration)
    }

    fn start_listener(&self) -> Result<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let registration = Arc::clone(&self.registration);
        let mut chords = ChordTracker::default();

        thread::Builder::new()
            .name("typewisp-hotkeys".into())
            .spawn(move || {
                let callback = move |event: rdev::Event| {
                    let guard = lock(&registration);
                    let Some(reg) = guard.as_ref() else {
                        return;
                    };
                    for event in chords.on_event(event.event_type, &reg.bindings) {
                        reg.events.emit(event);
                    }
                };
                // rdev::listen only returns on failure.
                if let Err(e) = rdev::listen(callback) {
                    tracing::error!(error = ?e, "Global hotkey listener stopped");
                }
            })?;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Own the `Enigo` instance on a dedicated thread; it is not `Send` on
/// every platform.
fn spawn_keyboard() -> Result<std_mpsc::Sender<KeystrokeRequest>> {
    let (tx, rx) = std_mpsc::channel::<KeystrokeRequest>();
    let (ready_tx, ready_rx) = std_mpsc::channel();

    thread::Builder::new()
        .name("typewisp-keyboard".into())
        .spawn(move || {
            let mut enigo = match Enigo::new(&Settings::default()) {
                Ok(enigo) => {
                    let _ = ready_tx.send(Ok(()));
                    enigo
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            for (ch, reply) in rx {
                let mut buf = [0u8; 4];
                let result = enigo
                    .text(ch.encode_utf8(&mut buf))
                    .map_err(|e| InjectionError::Backend(e.to_string()));
                let _ = reply.send(result);
            }
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(tx),
        Ok(Err(reason)) => Err(TypewispError::Dictation(format!(
            "keyboard backend unavailable: {reason}"
        ))),
        Err(_) => Err(TypewispError::Dictation(
            "keyboard thread exited during startup".into(),
        )),
    }
}

/// Run a blocking wait from sync code that may sit inside an async task.
/// On a multi-threaded runtime the worker hands its other tasks off first.
fn wait_blocking<T>(wait: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(wait)
        }
        _ => wait(),
    }
}

impl InputCapability for DesktopInput {
    fn register_hotkeys(&self, bindings: &HotkeyBindings, events: EventSender) -> Result<()> {
        *self.registration() = Some(Registration {
            bindings: bindings.clone(),
            events,
        });
        self.start_listener()?;
        for (role, hotkey) in bindings.iter() {
            tracing::info!(%role, %hotkey, "Global hotkey registered");
        }
        Ok(())
    }

    fn unregister_hotkeys(&self) {
        *self.registration() = None;
    }

    fn subscribe_focus_changes(&self, _events: EventSender) -> bool {
        false
    }

    fn inject_keystroke(&self, ch: char) -> std::result::Result<(), InjectionError> {
        let (reply_tx, reply_rx) = std_mpsc::channel();
        lock(&self.keyboard)
            .send((ch, reply_tx))
            .map_err(|_| InjectionError::Backend("keyboard thread stopped".into()))?;
        wait_blocking(|| reply_rx.recv())
            .map_err(|_| InjectionError::Backend("keyboard thread stopped".into()))?
    }

    fn foreground_window(&self) -> Option<WindowId> {
        None
    }

    fn focus_window(&self, _window: &WindowId) -> bool {
        false
    }
}

// =============================================================================
// Chord tracking
// =============================================================================

/// Turns raw key edges into hotkey events.
#[derive(Debug, Default)]
struct ChordTracker {
    modifiers: Modifiers,
    held: Vec<(HotkeyRole, Key)>,
}

impl ChordTracker {
    fn on_event(&mut self, event: EventType, bindings: &HotkeyBindings) -> Vec<DictationEvent> {
        match event {
            EventType::KeyPress(key) => {
                if self.set_modifier(key, true) {
                    return Vec::new();
                }
                let Some(key) = map_key(key) else {
                    return Vec::new();
                };
                let Some(role) = bindings.role_for(&Hotkey::new(self.modifiers, key)) else {
                    return Vec::new();
                };
                // OS auto-repeat reports a held key as more presses.
                if self.held.contains(&(role, key)) {
                    return Vec::new();
                }
                self.held.push((role, key));
                vec![DictationEvent::HotkeyDown(role)]
            }
            EventType::KeyRelease(key) => {
                if self.set_modifier(key, false) {
                    return Vec::new();
                }
                let Some(key) = map_key(key) else {
                    return Vec::new();
                };
                let mut released = Vec::new();
                self.held.retain(|(role, held_key)| {
                    if *held_key == key {
                        released.push(DictationEvent::HotkeyUp(*role));
                        false
                    } else {
                        true
                    }
                });
                released
            }
            _ => Vec::new(),
        }
    }

    fn set_modifier(&mut self, key: RdevKey, down: bool) -> bool {
        let slot = match key {
            RdevKey::ControlLeft | RdevKey::ControlRight => &mut self.modifiers.ctrl,
            RdevKey::Alt | RdevKey::AltGr => &mut self.modifiers.alt,
            RdevKey::ShiftLeft | RdevKey::ShiftRight => &mut self.modifiers.shift,
            RdevKey::MetaLeft | RdevKey::MetaRight => &mut self.modifiers.meta,
            _ => return false,
        };
        *slot = down;
        true
    }
}

fn map_key(key: RdevKey) -> Option<Key> {
    use RdevKey::*;
    let key = match key {
        F1 => Key::Function(1),
        F2 => Key::Function(2),
        F3 => Key::Function(3),
        F4 => Key::Function(4),
        F5 => Key::Function(5),
        F6 => Key::Function(6),
        F7 => Key::Function(7),
        F8 => Key::Function(8),
        F9 => Key::Function(9),
        F10 => Key::Function(10),
        F11 => Key::Function(11),
        F12 => Key::Function(12),
        Space => Key::Space,
        Return => Key::Enter,
        Tab => Key::Tab,
        Escape => Key::Escape,
        Insert => Key::Insert,
        Delete => Key::Delete,
        Home => Key::Home,
        End => Key::End,
        PageUp => Key::PageUp,
        PageDown => Key::PageDown,
        Pause => Key::Pause,
        ScrollLock => Key::ScrollLock,
        Num0 => Key::Char('0'),
        Num1 => Key::Char('1'),
        Num2 => Key::Char('2'),
        Num3 => Key::Char('3'),
        Num4 => Key::Char('4'),
        Num5 => Key::Char('5'),
        Num6 => Key::Char('6'),
        Num7 => Key::Char('7'),
        Num8 => Key::Char('8'),
        Num9 => Key::Char('9'),
        KeyA => Key::Char('a'),
        KeyB => Key::Char('b'),
        KeyC => Key::Char('c'),
        KeyD => Key::Char('d'),
        KeyE => Key::Char('e'),
        KeyF => Key::Char('f'),
        KeyG => Key::Char('g'),
        KeyH => Key::Char('h'),
        KeyI => Key::Char('i'),
        KeyJ => Key::Char('j'),
        KeyK => Key::Char('k'),
        KeyL => Key::Char('l'),
        KeyM => Key::Char('m'),
        KeyN => Key::Char('n'),
        KeyO => Key::Char('o'),
        KeyP => Key::Char('p'),
        KeyQ => Key::Char('q'),
        KeyR => Key::Char('r'),
        KeyS => Key::Char('s'),
        KeyT => Key::Char('t'),
        KeyU => Key::Char('u'),
        KeyV => Key::Char('v'),
        KeyW => Key::Char('w'),
        KeyX => Key::Char('x'),
        KeyY => Key::Char('y'),
        KeyZ => Key::Char('z'),
        _ => return None,
    };
    Some(key)
}
