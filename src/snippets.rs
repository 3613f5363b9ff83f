//! Snippet matcher.
//!
//! Tracks the characters typed since the last word boundary and decides, at
//! each delimiter key, whether the buffered word is a snippet trigger.
//! Triggers compare case-insensitively; the replacement keeps its exact case.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::config::SnippetRecord;
use crate::hook::KeyEvent;

/// Characters that end a word and trigger a swap check.
const DELIMITER_CHARS: [char; 6] = ['.', ',', '!', '?', ';', ':'];

/// Keys that never touch the buffer when pressed on their own.
const PASSIVE_KEYS: [&str; 5] = ["ctrl", "alt", "shift", "windows", "capslock"];

/// A matched trigger, ready to be erased and replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expansion {
    /// The trigger as the user typed it (original case).
    pub typed_trigger: String,
    pub replacement: String,
    /// Characters to erase: the trigger plus its delimiter.
    pub erase_count: usize,
}

#[derive(Debug, Default)]
pub struct SnippetMatcher {
    table: HashMap<String, String>,
    buffer: String,
}

impl SnippetMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the trigger table from snippet records.
    ///
    /// Inactive and blank triggers are skipped. When two active records share
    /// a trigger, the later one wins.
    pub fn reload(&mut self, records: &[SnippetRecord]) {
        self.table = build_table(records);
        self.buffer.clear();
        debug!(snippet_count = self.table.len(), "Snippet table reloaded");
    }

    /// Install a prebuilt table; used by the engine to swap under its lock.
    pub(crate) fn replace_table(&mut self, table: HashMap<String, String>) {
        self.table = table;
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Look up a trigger case-insensitively.
    pub fn replacement_for(&self, trigger: &str) -> Option<&str> {
        self.table.get(&trigger.to_lowercase()).map(String::as_str)
    }

    /// Triggers in sorted order, for listing.
    pub fn triggers(&self) -> Vec<&str> {
        let mut triggers: Vec<&str> = self.table.keys().map(String::as_str).collect();
        triggers.sort_unstable();
        triggers
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Feed one key-down event.
    ///
    /// `chorded` is true when ctrl, alt or windows is held; a printable key
    /// pressed that way is a shortcut, not typing, so the buffer resets.
    pub fn on_key(&mut self, event: &KeyEvent, chorded: bool) -> Option<Expansion> {
        if !event.is_down() {
            return None;
        }

        let key = event.key.as_str();
        if PASSIVE_KEYS.contains(&key) {
            return None;
        }

        if key == "backspace" {
            self.buffer.pop();
            return None;
        }

        if chorded {
            self.buffer.clear();
            return None;
        }

        if is_delimiter(event) {
            let expansion = self.check_buffer();
            self.buffer.clear();
            return expansion;
        }

        match event.character {
            Some(c) if is_printable(c) => {
                self.buffer.push(c);
                trace!(buffer_len = self.buffer.len(), "Snippet buffer appended");
            }
            _ => self.buffer.clear(),
        }
        None
    }

    fn check_buffer(&self) -> Option<Expansion> {
        if self.buffer.is_empty() {
            return None;
        }
        let replacement = self.table.get(&self.buffer.to_lowercase())?;
        Some(Expansion {
            typed_trigger: self.buffer.clone(),
            replacement: replacement.clone(),
            erase_count: self.buffer.chars().count() + 1,
        })
    }
}

/// Build the lowercase trigger table from records.
pub(crate) fn build_table(records: &[SnippetRecord]) -> HashMap<String, String> {
    let mut table = HashMap::new();
    for record in records.iter().filter(|r| r.active) {
        let trigger = record.trigger.trim();
        if trigger.is_empty() {
            continue;
        }
        table.insert(trigger.to_lowercase(), record.replacement.clone());
    }
    table
}

fn is_delimiter(event: &KeyEvent) -> bool {
    matches!(event.key.as_str(), "space" | "enter" | "tab")
        || event
            .character
            .is_some_and(|c| DELIMITER_CHARS.contains(&c))
}

fn is_printable(c: char) -> bool {
    !c.is_control() && !c.is_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::KeyToken;

    fn snippet(trigger: &str, replacement: &str, active: bool) -> SnippetRecord {
        SnippetRecord {
            trigger: trigger.to_string(),
            replacement: replacement.to_string(),
            active,
            created_at: None,
        }
    }

    fn key(name: &str) -> KeyEvent {
        KeyEvent::down(KeyToken::new(name), None)
    }

    fn space() -> KeyEvent {
        KeyEvent::down(KeyToken::new("space"), Some(' '))
    }

    fn type_word(matcher: &mut SnippetMatcher, word: &str) {
        for c in word.chars() {
            assert_eq!(matcher.on_key(&KeyEvent::char_down(c), false), None);
        }
    }

    fn omw_matcher() -> SnippetMatcher {
        let mut matcher = SnippetMatcher::new();
        matcher.reload(&[snippet("omw", "on my way", true)]);
        matcher
    }

    #[test]
    fn test_trigger_followed_by_space_expands() {
        let mut matcher = omw_matcher();
        type_word(&mut matcher, "omw");

        let expansion = matcher.on_key(&space(), false).expect("should expand");
        assert_eq!(expansion.typed_trigger, "omw");
        assert_eq!(expansion.replacement, "on my way");
        assert_eq!(expansion.erase_count, 4);
        assert_eq!(matcher.buffer(), "");
    }

    #[test]
    fn test_backspaced_word_does_not_expand() {
        let mut matcher = SnippetMatcher::new();
        matcher.reload(&[snippet("hi", "hello", true), snippet("h", "x", true)]);
        type_word(&mut matcher, "hi");
        matcher.on_key(&key("backspace"), false);
        matcher.on_key(&key("backspace"), false);

        assert_eq!(matcher.on_key(&space(), false), None);
        assert_eq!(matcher.buffer(), "");
    }

    #[test]
    fn test_backspace_on_empty_buffer_is_noop() {
        let mut matcher = omw_matcher();
        matcher.on_key(&key("backspace"), false);
        assert_eq!(matcher.buffer(), "");
    }

    #[test]
    fn test_trigger_match_is_case_insensitive() {
        let mut matcher = SnippetMatcher::new();
        matcher.reload(&[snippet("BRB", "Be Right Back", true)]);
        type_word(&mut matcher, "bRb");

        let expansion = matcher.on_key(&key("enter"), false).expect("should expand");
        assert_eq!(expansion.typed_trigger, "bRb");
        assert_eq!(expansion.replacement, "Be Right Back");
    }

    #[test]
    fn test_punctuation_delimiters_expand() {
        for delimiter in ['.', ',', '!', '?', ';', ':'] {
            let mut matcher = omw_matcher();
            type_word(&mut matcher, "omw");
            let event = KeyEvent::down(KeyToken::new(&delimiter.to_string()), Some(delimiter));
            assert!(
                matcher.on_key(&event, false).is_some(),
                "delimiter {delimiter:?} should expand"
            );
        }
    }

    #[test]
    fn test_tab_is_a_delimiter() {
        let mut matcher = omw_matcher();
        type_word(&mut matcher, "omw");
        assert!(matcher.on_key(&key("tab"), false).is_some());
    }

    #[test]
    fn test_unmatched_delimiter_clears_buffer() {
        let mut matcher = omw_matcher();
        type_word(&mut matcher, "hello");
        assert_eq!(matcher.on_key(&space(), false), None);
        assert_eq!(matcher.buffer(), "");
    }

    #[test]
    fn test_modifiers_alone_leave_buffer_untouched() {
        let mut matcher = omw_matcher();
        type_word(&mut matcher, "om");
        for name in ["shift", "ctrl", "alt", "windows", "capslock"] {
            matcher.on_key(&key(name), false);
        }
        type_word(&mut matcher, "w");
        assert!(matcher.on_key(&space(), false).is_some());
    }

    #[test]
    fn test_navigation_key_resets_buffer() {
        let mut matcher = omw_matcher();
        type_word(&mut matcher, "om");
        matcher.on_key(&key("left"), false);
        type_word(&mut matcher, "w");
        assert_eq!(matcher.on_key(&space(), false), None);
    }

    #[test]
    fn test_chorded_character_resets_buffer() {
        let mut matcher = omw_matcher();
        type_word(&mut matcher, "om");
        matcher.on_key(&KeyEvent::char_down('c'), true);
        assert_eq!(matcher.buffer(), "");
    }

    #[test]
    fn test_key_up_is_ignored() {
        let mut matcher = omw_matcher();
        type_word(&mut matcher, "omw");
        assert_eq!(matcher.on_key(&KeyEvent::up(KeyToken::new("space")), false), None);
        assert_eq!(matcher.buffer(), "omw");
    }

    #[test]
    fn test_reload_skips_inactive_and_blank() {
        let mut matcher = SnippetMatcher::new();
        matcher.reload(&[
            snippet("omw", "on my way", true),
            snippet("off", "not here", false),
            snippet("   ", "blank", true),
        ]);
        assert_eq!(matcher.len(), 1);
        assert!(matcher.replacement_for("off").is_none());
        assert_eq!(matcher.replacement_for("OMW"), Some("on my way"));
    }

    #[test]
    fn test_reload_last_duplicate_wins() {
        let mut matcher = SnippetMatcher::new();
        matcher.reload(&[snippet("sig", "first", true), snippet("SIG", "second", true)]);
        assert_eq!(matcher.len(), 1);
        assert_eq!(matcher.replacement_for("sig"), Some("second"));
    }

    #[test]
    fn test_reload_twice_yields_same_table() {
        let records = [snippet("a1", "one", true), snippet("b2", "two", true)];
        assert_eq!(build_table(&records), build_table(&records));
    }

    #[test]
    fn test_erase_count_counts_characters_not_bytes() {
        let mut matcher = SnippetMatcher::new();
        matcher.reload(&[snippet("café", "coffee shop", true)]);
        type_word(&mut matcher, "café");
        let expansion = matcher.on_key(&space(), false).expect("should expand");
        assert_eq!(expansion.erase_count, 5);
    }
}
