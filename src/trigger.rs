//! Trigger grammar for hotkey combinations.
//!
//! This module provides:
//! - `KeyToken` - Canonical name for one physical key (`ctrl`, `a`, `f5`, `space`)
//! - `Trigger` - An order-independent set of key tokens (`ctrl+alt+t`)
//! - `TriggerParseError` - Returned only for blank input
//!
//! Unknown key names are kept as opaque tokens instead of being rejected, so
//! a config written against a slightly different key vocabulary still loads.
//! An opaque token only matches an event carrying the exact same name.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors that can occur when parsing a trigger string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerParseError {
    #[error("trigger string is empty")]
    Empty,
}

/// Modifier display order: ctrl, alt, shift, windows.
const MODIFIER_ORDER: [&str; 4] = ["ctrl", "alt", "shift", "windows"];

/// Canonical name for a single physical key.
///
/// Always stored lowercase, so equality is case-insensitive by construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyToken(String);

impl KeyToken {
    /// Build a token from any key name, applying alias canonicalization.
    pub fn new(name: &str) -> Self {
        Self(canonicalize_key(name))
    }

    pub fn ctrl() -> Self {
        Self("ctrl".to_string())
    }
    pub fn alt() -> Self {
        Self("alt".to_string())
    }
    pub fn shift() -> Self {
        Self("shift".to_string())
    }
    pub fn windows() -> Self {
        Self("windows".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for ctrl, alt, shift and windows.
    pub fn is_modifier(&self) -> bool {
        self.modifier_rank().is_some()
    }

    /// True for modifiers that turn a printable key into a chord (everything but shift).
    pub fn is_chord_modifier(&self) -> bool {
        matches!(self.0.as_str(), "ctrl" | "alt" | "windows")
    }

    /// Whether this token belongs to the fixed key vocabulary.
    pub fn is_known(&self) -> bool {
        self.is_modifier() || is_known_key(&self.0)
    }

    fn modifier_rank(&self) -> Option<usize> {
        MODIFIER_ORDER.iter().position(|m| *m == self.0)
    }

    fn label(&self) -> String {
        match self.0.as_str() {
            "ctrl" => "Ctrl",
            "alt" => "Alt",
            "shift" => "Shift",
            "windows" => "Win",
            "enter" => "Enter",
            "escape" => "Esc",
            "tab" => "Tab",
            "space" => "Space",
            "backspace" => "Backspace",
            "delete" => "Delete",
            "insert" => "Insert",
            "up" => "Up",
            "down" => "Down",
            "left" => "Left",
            "right" => "Right",
            "home" => "Home",
            "end" => "End",
            "pageup" => "PageUp",
            "pagedown" => "PageDown",
            "capslock" => "CapsLock",
            "printscreen" => "PrintScreen",
            k => return k.to_uppercase(),
        }
        .to_string()
    }
}

impl Ord for KeyToken {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.modifier_rank(), other.modifier_rank()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for KeyToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A hotkey trigger: the set of keys that must be held together.
///
/// Iteration order is the display order: modifiers in the fixed sequence
/// ctrl, alt, shift, windows, then the remaining keys alphabetically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Trigger {
    keys: BTreeSet<KeyToken>,
}

impl Trigger {
    pub fn from_tokens(tokens: impl IntoIterator<Item = KeyToken>) -> Self {
        Self {
            keys: tokens.into_iter().collect(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, TriggerParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TriggerParseError::Empty);
        }

        let mut keys = BTreeSet::new();
        let mut pending_plus = false;
        for part in s.split('+') {
            let part = part.trim();
            if part.is_empty() {
                // "ctrl++" and "+" both name the plus key; collapse repeated empties.
                if !pending_plus {
                    keys.insert(KeyToken::new("plus"));
                    pending_plus = true;
                }
                continue;
            }
            pending_plus = false;
            keys.insert(KeyToken::new(part));
        }

        Ok(Self { keys })
    }

    pub fn keys(&self) -> impl Iterator<Item = &KeyToken> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &KeyToken) -> bool {
        self.keys.contains(key)
    }

    /// Keys that are not in the fixed vocabulary.
    pub fn opaque_keys(&self) -> Vec<&KeyToken> {
        self.keys.iter().filter(|k| !k.is_known()).collect()
    }

    /// True if the set of held keys is exactly this trigger.
    pub fn matches_held<'a>(&self, held: impl IntoIterator<Item = &'a KeyToken>) -> bool {
        let mut count = 0;
        for key in held {
            if !self.keys.contains(key) {
                return false;
            }
            count += 1;
        }
        count == self.keys.len()
    }

    /// Canonical config form, e.g. `ctrl+alt+t`.
    pub fn format(&self) -> String {
        self.keys
            .iter()
            .map(KeyToken::as_str)
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Human form, e.g. `Ctrl+Alt+T`.
    pub fn label(&self) -> String {
        self.keys
            .iter()
            .map(KeyToken::label)
            .collect::<Vec<_>>()
            .join("+")
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for Trigger {
    type Err = TriggerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Trigger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for Trigger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Canonicalize a key name to the internal standard form.
pub fn canonicalize_key(key: &str) -> String {
    let key_lower = key.trim().to_lowercase();

    // Side-specific modifiers ("left ctrl", "right shift") collapse to the generic key.
    if let Some(side) = key_lower
        .strip_prefix("left ")
        .or_else(|| key_lower.strip_prefix("right "))
    {
        let generic = canonicalize_key(side);
        if MODIFIER_ORDER.contains(&generic.as_str()) {
            return generic;
        }
    }
    let compact: String = key_lower.split_whitespace().collect();

    match compact.as_str() {
        "control" | "ctl" | "lctrl" | "rctrl" | "lcontrol" | "rcontrol" => "ctrl",
        "cmd" | "command" | "meta" | "super" | "win" | "lwin" | "rwin" | "windows" => "windows",
        "option" | "opt" | "altgr" | "lalt" | "ralt" => "alt",
        "menu" | "contextmenu" => "apps",
        "shft" | "lshift" | "rshift" => "shift",
        "arrowup" | "uparrow" => "up",
        "arrowdown" | "downarrow" => "down",
        "arrowleft" | "leftarrow" => "left",
        "arrowright" | "rightarrow" => "right",
        "return" => "enter",
        "esc" => "escape",
        "back" => "backspace",
        "del" => "delete",
        "ins" => "insert",
        "spacebar" => "space",
        "capital" => "capslock",
        "prtsc" | "printscr" | "snapshot" => "printscreen",
        "/" | "forwardslash" => "slash",
        "\\" => "backslash",
        ";" => "semicolon",
        "'" | "apostrophe" => "quote",
        "," => "comma",
        "." | "dot" => "period",
        "[" | "leftbracket" => "bracketleft",
        "]" | "rightbracket" => "bracketright",
        "-" | "dash" | "hyphen" => "minus",
        // Main-row plus shares the `=` key; keyboards never report a separate plus key.
        "=" | "equals" | "+" | "plus" => "equal",
        "`" | "backtick" | "grave" => "backquote",
        "pgup" => "pageup",
        "pgdn" | "pgdown" => "pagedown",
        _ => return compact,
    }
    .to_string()
}

/// Check if a key name is part of the fixed vocabulary.
pub fn is_known_key(key: &str) -> bool {
    if let Some(n) = key.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        return (1..=24).contains(&n);
    }
    if let Some(n) = key.strip_prefix("num").and_then(|n| n.parse::<u8>().ok()) {
        return n <= 9;
    }
    if key.len() == 1 {
        return key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    }
    matches!(
        key,
        "space"
            | "enter"
            | "tab"
            | "escape"
            | "backspace"
            | "delete"
            | "insert"
            | "up"
            | "down"
            | "left"
            | "right"
            | "home"
            | "end"
            | "pageup"
            | "pagedown"
            | "capslock"
            | "numlock"
            | "scrolllock"
            | "printscreen"
            | "pause"
            | "apps"
            | "semicolon"
            | "quote"
            | "comma"
            | "period"
            | "slash"
            | "backslash"
            | "bracketleft"
            | "bracketright"
            | "minus"
            | "equal"
            | "backquote"
            | "multiply"
            | "add"
            | "subtract"
            | "decimal"
            | "divide"
            | "volumeup"
            | "volumedown"
            | "volumemute"
            | "playpause"
            | "nexttrack"
            | "prevtrack"
    )
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
