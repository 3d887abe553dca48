//! Hotkey parsing and role bindings.
//!
//! Accepts both the bracketed form used by keyboard hook libraries
//! (`<ctrl>+<alt>+h`, `<f8>`) and the plain form (`Ctrl+Shift+D`, `F9`).
//! Parsing is case-insensitive; display is canonical (`Ctrl+Shift+D`).

use std::fmt;
use std::str::FromStr;

use typewisp_core::config::DictationConfig;
use typewisp_core::error::{Result, TypewispError};

/// Modifier keys held together with the main key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.alt || self.shift || self.meta)
    }
}

/// Non-modifier keys that can trigger a hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// F1 through F24.
    Function(u8),
    /// A printable key, stored lowercase.
    Char(char),
    Space,
    Enter,
    Tab,
    Escape,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Pause,
    ScrollLock,
}

impl Key {
    fn parse(token: &str) -> Option<Key> {
        let named = match token {
            "space" => Some(Key::Space),
            "enter" | "return" => Some(Key::Enter),
            "tab" => Some(Key::Tab),
            "esc" | "escape" => Some(Key::Escape),
            "insert" | "ins" => Some(Key::Insert),
            "delete" | "del" => Some(Key::Delete),
            "home" => Some(Key::Home),
            "end" => Some(Key::End),
            "page_up" | "pageup" | "pgup" => Some(Key::PageUp),
            "page_down" | "pagedown" | "pgdn" => Some(Key::PageDown),
            "pause" => Some(Key::Pause),
            "scroll_lock" | "scrolllock" => Some(Key::ScrollLock),
            _ => None,
        };
        if named.is_some() {
            return named;
        }

        if let Some(num) = token.strip_prefix('f') {
            if let Ok(n) = num.parse::<u8>() {
                return (1..=24).contains(&n).then_some(Key::Function(n));
            }
        }

        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() && c != '+' => Some(Key::Char(c)),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Function(n) => write!(f, "F{n}"),
            Key::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            Key::Space => write!(f, "Space"),
            Key::Enter => write!(f, "Enter"),
            Key::Tab => write!(f, "Tab"),
            Key::Escape => write!(f, "Esc"),
            Key::Insert => write!(f, "Insert"),
            Key::Delete => write!(f, "Delete"),
            Key::Home => write!(f, "Home"),
            Key::End => write!(f, "End"),
            Key::PageUp => write!(f, "PageUp"),
            Key::PageDown => write!(f, "PageDown"),
            Key::Pause => write!(f, "Pause"),
            Key::ScrollLock => write!(f, "ScrollLock"),
        }
    }
}

/// A key plus the modifiers that must be held with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl Hotkey {
    pub fn new(modifiers: Modifiers, key: Key) -> Self {
        Self { modifiers, key }
    }
}

impl FromStr for Hotkey {
    type Err = TypewispError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| TypewispError::Config(format!("invalid hotkey '{s}': {why}"));

        let spec = s.trim().to_ascii_lowercase();
        if spec.is_empty() {
            return Err(invalid("empty"));
        }

        let mut modifiers = Modifiers::none();
        let mut key = None;

        for raw in spec.split('+') {
            let token = raw.trim().trim_start_matches('<').trim_end_matches('>');
            if token.is_empty() {
                return Err(invalid("empty key name"));
            }
            match token {
                "ctrl" | "control" | "ctrl_l" | "ctrl_r" => modifiers.ctrl = true,
                "alt" | "alt_l" | "alt_r" | "alt_gr" | "option" => modifiers.alt = true,
                "shift" | "shift_l" | "shift_r" => modifiers.shift = true,
                "cmd" | "cmd_l" | "cmd_r" | "super" | "win" | "meta" => modifiers.meta = true,
                other => {
                    if key.is_some() {
                        return Err(invalid("more than one non-modifier key"));
                    }
                    key = Some(Key::parse(other).ok_or_else(|| invalid("unknown key"))?);
                }
            }
        }

        let key = key.ok_or_else(|| invalid("missing key"))?;
        Ok(Hotkey { modifiers, key })
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.modifiers;
        for (held, name) in [
            (m.ctrl, "Ctrl"),
            (m.alt, "Alt"),
            (m.shift, "Shift"),
            (m.meta, "Meta"),
        ] {
            if held {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

/// What a hotkey does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyRole {
    /// Start / stop recording.
    Record,
    /// Type the staged transcript.
    Type,
    /// Rewrite the staged transcript.
    Improve,
    /// Toggle the paused state.
    Pause,
}

impl fmt::Display for HotkeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotkeyRole::Record => write!(f, "record"),
            HotkeyRole::Type => write!(f, "type"),
            HotkeyRole::Improve => write!(f, "improve"),
            HotkeyRole::Pause => write!(f, "pause"),
        }
    }
}

/// The full set of hotkeys an input capability must register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyBindings {
    pub record: Hotkey,
    pub type_text: Hotkey,
    pub improve: Hotkey,
    pub pause: Option<Hotkey>,
}

impl HotkeyBindings {
    /// Parse and validate the hotkeys from the dictation config.
    ///
    /// Fails with `TypewispError::Config` when a hotkey does not parse or two
    /// roles share the same key combination.
    pub fn from_config(config: &DictationConfig) -> Result<Self> {
        let bindings = Self {
            record: config.hotkey.parse()?,
            type_text: config.type_hotkey.parse()?,
            improve: config.improve_hotkey.parse()?,
            pause: config
                .pause_hotkey
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .transpose()?,
        };

        let all: Vec<(HotkeyRole, Hotkey)> = bindings.iter().collect();
        for (i, (role_a, key_a)) in all.iter().enumerate() {
            if let Some((role_b, _)) = all[i + 1..].iter().find(|(_, key_b)| key_b == key_a) {
                return Err(TypewispError::Config(format!(
                    "hotkey {key_a} is bound to both {role_a} and {role_b}"
                )));
            }
        }
        Ok(bindings)
    }

    /// Every bound hotkey with its role.
    pub fn iter(&self) -> impl Iterator<Item = (HotkeyRole, Hotkey)> + '_ {
        [
            Some((HotkeyRole::Record, self.record)),
            Some((HotkeyRole::Type, self.type_text)),
            Some((HotkeyRole::Improve, self.improve)),
            self.pause.map(|p| (HotkeyRole::Pause, p)),
        ]
        .into_iter()
        .flatten()
    }

    /// The role bound to a key combination, if any.
    pub fn role_for(&self, hotkey: &Hotkey) -> Option<HotkeyRole> {
        self.iter()
            .find(|(_, bound)| bound == hotkey)
            .map(|(role, _)| role)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bracketed_function_key() {
        let hk: Hotkey = "<f8>".parse().unwrap();
        assert_eq!(hk.key, Key::Function(8));
        assert!(hk.modifiers.is_empty());
        assert_eq!(hk.to_string(), "F8");
    }

    #[test]
    fn test_parse_bracketed_combo() {
        let hk: Hotkey = "<ctrl>+<alt>+h".parse().unwrap();
        assert!(hk.modifiers.ctrl);
        assert!(hk.modifiers.alt);
        assert!(!hk.modifiers.shift);
        assert_eq!(hk.key, Key::Char('h'));
        assert_eq!(hk.to_string(), "Ctrl+Alt+H");
    }

    #[test]
    fn test_parse_plain_forms_are_equivalent() {
        let a: Hotkey = "Ctrl+Shift+D".parse().unwrap();
        let b: Hotkey = "<shift>+<ctrl>+d".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!("F9".parse::<Hotkey>().unwrap().key, Key::Function(9));
        assert_eq!("cmd+space".parse::<Hotkey>().unwrap().key, Key::Space);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "ctrl+", "ctrl+shift", "f25", "a+b", "<hyper>+x", "ctrl++x"] {
            assert!(bad.parse::<Hotkey>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_parse_error_is_config() {
        let err = "nonsense-key".parse::<Hotkey>().unwrap_err();
        assert!(matches!(err, TypewispError::Config(_)));
        assert!(err.to_string().contains("nonsense-key"));
    }

    #[test]
    fn test_bindings_from_default_config() {
        let bindings = HotkeyBindings::from_config(&DictationConfig::default()).unwrap();
        assert_eq!(bindings.record.key, Key::Function(8));
        assert_eq!(bindings.type_text.key, Key::Function(9));
        assert_eq!(bindings.improve.key, Key::Function(10));
        assert!(bindings.pause.is_none());
        assert_eq!(bindings.iter().count(), 3);
        assert_eq!(
            bindings.role_for(&"<f9>".parse().unwrap()),
            Some(HotkeyRole::Type)
        );
        assert_eq!(bindings.role_for(&"<f1>".parse().unwrap()), None);
    }

    #[test]
    fn test_bindings_reject_duplicates() {
        let config = DictationConfig {
            hotkey: "F8".into(),
            pause_hotkey: Some("<f8>".into()),
            ..DictationConfig::default()
        };
        let err = HotkeyBindings::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("record"));
        assert!(err.to_string().contains("pause"));
    }

    #[test]
    fn test_blank_pause_hotkey_is_unbound() {
        let config = DictationConfig {
            pause_hotkey: Some("  ".into()),
            ..DictationConfig::default()
        };
        let bindings = HotkeyBindings::from_config(&config).unwrap();
        assert!(bindings.pause.is_none());
    }
}
