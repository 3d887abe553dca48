//! Stdin-driven front-end.
//!
//! Stands in for the OS keyboard: lines on stdin simulate hotkeys, focus
//! changes and user commands, and typed text is written to stdout. Logs go
//! to stderr so the two don't interleave.

use std::io::{BufRead, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use typewisp_core::error::{InjectionError, Result};
use typewisp_core::types::WindowId;
use typewisp_dictation::{
    DictationEvent, DictationSettings, EventSender, HotkeyBindings, HotkeyRole, InputCapability,
    OrchestratorHandle,
};

const HELP: &str = "\
commands:
  press [record|type|improve|pause]    hotkey down (default: record)
  release [record|type|improve|pause]  hotkey up (default: record)
  type                                 type the staged transcript
  improve                              improve the staged transcript
  focus <window>                       move input focus to <window>
  pause | resume | stop | reload | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Press(HotkeyRole),
    Release(HotkeyRole),
    Focus(String),
    Pause,
    Resume,
    Stop,
    Reload,
    Quit,
    Help,
}

fn parse_role(token: Option<&str>) -> std::result::Result<HotkeyRole, String> {
    match token {
        None | Some("record") => Ok(HotkeyRole::Record),
        Some("type") => Ok(HotkeyRole::Type),
        Some("improve") => Ok(HotkeyRole::Improve),
        Some("pause") => Ok(HotkeyRole::Pause),
        Some(other) => Err(format!("unknown hotkey role '{other}'")),
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".into());
        };
        let command = match verb.to_ascii_lowercase().as_str() {
            "press" | "p" => Command::Press(parse_role(words.next())?),
            "release" | "r" => Command::Release(parse_role(words.next())?),
            "type" => Command::Press(HotkeyRole::Type),
            "improve" => Command::Press(HotkeyRole::Improve),
            "focus" => {
                let window = words.collect::<Vec<_>>().join(" ");
                if window.is_empty() {
                    return Err("focus needs a window name".into());
                }
                Command::Focus(window)
            }
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "stop" => Command::Stop,
            "reload" => Command::Reload,
            "quit" | "exit" | "q" => Command::Quit,
            "help" | "?" => Command::Help,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(command)
    }
}

// =============================================================================
// Capability
// =============================================================================

#[derive(Debug)]
struct ConsoleState {
    bindings: Option<HotkeyBindings>,
    hotkeys: Option<EventSender>,
    focus: Option<EventSender>,
    foreground: WindowId,
}

/// Input capability backed by the terminal.
#[derive(Debug)]
pub struct ConsoleInput {
    state: Mutex<ConsoleState>,
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleInput {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConsoleState {
                bindings: None,
                hotkeys: None,
                focus: None,
                foreground: WindowId::new("console"),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver a hotkey edge for `role`. False if the role is not bound.
    pub fn hotkey(&self, role: HotkeyRole, down: bool) -> bool {
        let state = self.lock();
        let bound = state
            .bindings
            .as_ref()
            .is_some_and(|b| b.iter().any(|(r, _)| r == role));
        match (&state.hotkeys, bound) {
            (Some(events), true) => {
                let event = if down {
                    DictationEvent::HotkeyDown(role)
                } else {
                    DictationEvent::HotkeyUp(role)
                };
                events.emit(event)
            }
            _ => false,
        }
    }

    pub fn set_foreground(&self, window: WindowId) {
        let mut state = self.lock();
        if state.foreground == window {
            return;
        }
        state.foreground = window.clone();
        if let Some(events) = &state.focus {
            events.emit(DictationEvent::FocusChanged(window));
        }
    }
}

impl InputCapability for ConsoleInput {
    fn register_hotkeys(&self, bindings: &HotkeyBindings, events: EventSender) -> Result<()> {
        let mut state = self.lock();
        for (role, hotkey) in bindings.iter() {
            tracing::info!(%role, %hotkey, "Hotkey bound (simulated on stdin)");
        }
        state.bindings = Some(bindings.clone());
        state.hotkeys = Some(events);
        Ok(())
    }

    fn unregister_hotkeys(&self) {
        let mut state = self.lock();
        state.bindings = None;
        state.hotkeys = None;
    }

    fn subscribe_focus_changes(&self, events: EventSender) -> bool {
        self.lock().focus = Some(events);
        true
    }

    fn inject_keystroke(&self, ch: char) -> std::result::Result<(), InjectionError> {
        if ch.is_control() && ch != '\n' && ch != '\t' {
            return Err(InjectionError::Unsupported(ch));
        }
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{ch}")
            .and_then(|_| stdout.flush())
            .map_err(|e| InjectionError::Backend(e.to_string()))
    }

    fn foreground_window(&self) -> Option<WindowId> {
        Some(self.lock().foreground.clone())
    }

    fn focus_window(&self, window: &WindowId) -> bool {
        self.lock().foreground = window.clone();
        true
    }
}

// =============================================================================
// Command loop
// =============================================================================

/// Read stdin on a plain thread so a pending read never holds up runtime
/// shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Drive the orchestrator from stdin until `quit` or end of input.
pub async fn run<F>(input: Arc<ConsoleInput>, handle: OrchestratorHandle, reload: F) -> Result<()>
where
    F: Fn() -> Result<DictationSettings> + Send,
{
    let mut lines = spawn_stdin_reader();
    eprintln!("{HELP}");

    while let Some(line) = lines.recv().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        tracing::debug!(?command, "Console command");

        match command {
            Command::Press(role) => {
                if !input.hotkey(role, true) {
                    eprintln!("no hotkey bound for {role}");
                }
            }
            Command::Release(role) => {
                input.hotkey(role, false);
            }
            Command::Focus(window) => input.set_foreground(WindowId::new(window)),
            Command::Pause => handle.send(DictationEvent::Pause).await?,
            Command::Resume => handle.send(DictationEvent::Resume).await?,
            Command::Stop => handle.send(DictationEvent::Stop).await?,
            Command::Reload => match reload() {
                Ok(settings) => handle.reload(settings).await?,
                Err(e) => tracing::warn!(error = %e, "Reload rejected, keeping current settings"),
            },
            Command::Quit => break,
            Command::Help => eprintln!("{HELP}"),
        }
    }

    handle.shutdown().await
}
