// Hotkey string grammar
// "Ctrl+Shift+A" style combinations mapped onto virtual key codes

use std::collections::HashSet;

pub const VK_BACK: u16 = 8;
pub const VK_TAB: u16 = 9;
pub const VK_RETURN: u16 = 13;
pub const VK_SHIFT: u16 = 16;
pub const VK_CONTROL: u16 = 17;
pub const VK_MENU: u16 = 18;
pub const VK_ESCAPE: u16 = 27;
pub const VK_SPACE: u16 = 32;
pub const VK_LWIN: u16 = 91;
pub const VK_F1: u16 = 112;
pub const VK_LSHIFT: u16 = 160;
pub const VK_RSHIFT: u16 = 161;
pub const VK_LCONTROL: u16 = 162;
pub const VK_RCONTROL: u16 = 163;
pub const VK_LMENU: u16 = 164;
pub const VK_RMENU: u16 = 165;

/// One `+`-separated piece of a hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyToken {
    /// Ctrl, Shift or Alt: satisfied by the generic code or either physical side.
    Modifier { generic: u16, left: u16, right: u16 },
    Key(u16),
}

impl KeyToken {
    /// Parse a single token, case-insensitive. `None` for anything unknown.
    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.trim().to_ascii_uppercase();

        if let [ch] = name.as_bytes() {
            if ch.is_ascii_uppercase() || ch.is_ascii_digit() {
                return Some(KeyToken::Key(*ch as u16));
            }
        }

        if let Some(num) = name.strip_prefix('F').and_then(|n| n.parse::<u16>().ok()) {
            if (1..=12).contains(&num) {
                return Some(KeyToken::Key(VK_F1 + num - 1));
            }
        }

        let token = match name.as_str() {
            "CTRL" | "CONTROL" => KeyToken::Modifier {
                generic: VK_CONTROL,
                left: VK_LCONTROL,
                right: VK_RCONTROL,
            },
            "SHIFT" => KeyToken::Modifier {
                generic: VK_SHIFT,
                left: VK_LSHIFT,
                right: VK_RSHIFT,
            },
            "ALT" => KeyToken::Modifier {
                generic: VK_MENU,
                left: VK_LMENU,
                right: VK_RMENU,
            },
            "META" | "WIN" | "CMD" => KeyToken::Key(VK_LWIN),
            "SPACE" => KeyToken::Key(VK_SPACE),
            "ENTER" => KeyToken::Key(VK_RETURN),
            "ESC" | "ESCAPE" => KeyToken::Key(VK_ESCAPE),
            "TAB" => KeyToken::Key(VK_TAB),
            "BACKSPACE" => KeyToken::Key(VK_BACK),
            _ => return None,
        };
        Some(token)
    }

    pub fn is_down(&self, pressed: &HashSet<u16>) -> bool {
        match *self {
            KeyToken::Key(code) => pressed.contains(&code),
            KeyToken::Modifier {
                generic,
                left,
                right,
            } => pressed.contains(&generic) || pressed.contains(&left) || pressed.contains(&right),
        }
    }

    /// Whether `code` is one of the codes that can satisfy this token.
    pub fn accepts(&self, code: u16) -> bool {
        match *self {
            KeyToken::Key(c) => c == code,
            KeyToken::Modifier {
                generic,
                left,
                right,
            } => code == generic || code == left || code == right,
        }
    }
}

/// A parsed key combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hotkey {
    Combination(Vec<KeyToken>),
    /// Contains a token we cannot map. Never matches.
    Unmatchable,
}

impl Hotkey {
    /// Parse a stored hotkey. Returns `None` when there is no hotkey at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let tokens: Option<Vec<KeyToken>> = raw.split('+').map(KeyToken::parse).collect();
        Some(match tokens {
            Some(mut tokens) => {
                tokens.sort();
                tokens.dedup();
                Hotkey::Combination(tokens)
            }
            None => Hotkey::Unmatchable,
        })
    }

    /// Every token is held down.
    pub fn is_pressed(&self, pressed: &HashSet<u16>) -> bool {
        match self {
            Hotkey::Combination(tokens) => tokens.iter().all(|t| t.is_down(pressed)),
            Hotkey::Unmatchable => false,
        }
    }

    pub fn involves(&self, code: u16) -> bool {
        match self {
            Hotkey::Combination(tokens) => tokens.iter().any(|t| t.accepts(code)),
            Hotkey::Unmatchable => false,
        }
    }

    /// Two hotkeys that fire on exactly the same keys.
    pub fn same_keys(&self, other: &Hotkey) -> bool {
        matches!((self, other), (Hotkey::Combination(a), Hotkey::Combination(b)) if a == b)
    }
}

/// Turn user input into the string stored on the clip.
///
/// A lone ESC/ESCAPE means "remove the hotkey" and becomes the empty string.
pub fn normalize_hotkey(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("esc") || trimmed.eq_ignore_ascii_case("escape") {
        return String::new();
    }
    trimmed.to_string()
}
