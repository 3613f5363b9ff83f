//! Configuration type definitions
//!
//! Field names follow the persisted JSON (`trigger`, `type`, `created_at`).

use serde::{Deserialize, Serialize};

use super::defaults::*;

// ============================================
// BINDINGS
// ============================================

/// A hotkey as stored in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyRecord {
    #[serde(default)]
    pub trigger: String,
    /// One of `File`, `Folder`, `run`, `focus`, `open_url`
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub target: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Swallow the combination so the focused app never sees it (default: false)
    #[serde(default = "default_suppress")]
    pub suppress: bool,
    /// Seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
}

/// A text-expansion snippet as stored in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetRecord {
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub replacement: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
}

fn default_active() -> bool {
    DEFAULT_ACTIVE
}
fn default_suppress() -> bool {
    DEFAULT_SUPPRESS
}

// ============================================
// ENGINE SETTINGS
// ============================================

/// Runtime knobs for the engine and text injection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Wait before erasing, so the delimiter reaches the target app first (default: 50)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Wait between erasing and pasting, and after pasting (default: 50)
    #[serde(default = "default_paste_delay_ms")]
    pub paste_delay_ms: u64,
    /// Per-character delay when typing without the clipboard (default: 5)
    #[serde(default = "default_char_delay_ms")]
    pub char_delay_ms: u64,
    /// Put the previous clipboard text back after pasting (default: false)
    #[serde(default = "default_restore_clipboard")]
    pub restore_clipboard: bool,
    /// Pending actions before new ones are dropped (default: 64)
    #[serde(default = "default_action_queue_capacity")]
    pub action_queue_capacity: usize,
    #[serde(default = "default_subscriber_enabled")]
    pub hotkeys_enabled: bool,
    #[serde(default = "default_subscriber_enabled")]
    pub snippets_enabled: bool,
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}
fn default_paste_delay_ms() -> u64 {
    DEFAULT_PASTE_DELAY_MS
}
fn default_char_delay_ms() -> u64 {
    DEFAULT_CHAR_DELAY_MS
}
fn default_restore_clipboard() -> bool {
    DEFAULT_RESTORE_CLIPBOARD
}
fn default_action_queue_capacity() -> usize {
    DEFAULT_ACTION_QUEUE_CAPACITY
}
fn default_subscriber_enabled() -> bool {
    true
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            paste_delay_ms: DEFAULT_PASTE_DELAY_MS,
            char_delay_ms: DEFAULT_CHAR_DELAY_MS,
            restore_clipboard: DEFAULT_RESTORE_CLIPBOARD,
            action_queue_capacity: DEFAULT_ACTION_QUEUE_CAPACITY,
            hotkeys_enabled: true,
            snippets_enabled: true,
        }
    }
}

// ============================================
// MAIN CONFIG
// ============================================

/// The whole config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hotkeys: Vec<HotkeyRecord>,
    #[serde(default)]
    pub snippets: Vec<SnippetRecord>,
    #[serde(default)]
    pub settings: EngineSettings,
}

impl Config {
    pub fn active_hotkeys(&self) -> impl Iterator<Item = &HotkeyRecord> {
        self.hotkeys.iter().filter(|h| h.active)
    }

    pub fn active_snippets(&self) -> impl Iterator<Item = &SnippetRecord> {
        self.snippets.iter().filter(|s| s.active)
    }
}
