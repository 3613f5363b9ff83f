//! In-process hook backend driven by scripted key events.
//!
//! Clones share state, so a test can hand one clone to the engine and keep
//! another to feed events and inspect claims.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{HookBackend, HookError, KeyEvent, KeySink, KeyStateFn, Verdict};
use crate::trigger::{KeyToken, Trigger};

#[derive(Default)]
struct SimulatedState {
    sink: Option<KeySink>,
    install_count: usize,
    claimed: Vec<Trigger>,
    taken: HashSet<Trigger>,
    /// Keys physically down, whether or not the hook saw them go down.
    pressed: HashSet<KeyToken>,
}

#[derive(Clone, Default)]
pub struct SimulatedHook {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend another process already owns `trigger`.
    pub fn with_conflict(self, trigger: &str) -> Self {
        if let Ok(trigger) = Trigger::parse(trigger) {
            self.state.lock().taken.insert(trigger);
        }
        self
    }

    /// Deliver one event. Returns `Pass` when no hook is installed.
    pub fn feed(&self, event: &KeyEvent) -> Verdict {
        // Clone the sink out so the callback runs without our lock held.
        let sink = {
            let mut state = self.state.lock();
            if event.is_down() {
                state.pressed.insert(event.key.clone());
            } else {
                state.pressed.remove(&event.key);
            }
            state.sink.clone()
        };
        match sink {
            Some(sink) => sink(event),
            None => Verdict::Pass,
        }
    }

    /// Press every key of `trigger` in display order, then release them in reverse.
    ///
    /// Returns the verdict for each event in delivery order.
    pub fn press_chord(&self, trigger: &str) -> Vec<Verdict> {
        let Ok(trigger) = Trigger::parse(trigger) else {
            return Vec::new();
        };
        let keys: Vec<KeyToken> = trigger.keys().cloned().collect();
        let mut verdicts = Vec::with_capacity(keys.len() * 2);
        for key in &keys {
            verdicts.push(self.feed(&KeyEvent::down(key.clone(), None)));
        }
        for key in keys.iter().rev() {
            verdicts.push(self.feed(&KeyEvent::up(key.clone())));
        }
        verdicts
    }

    /// Type text as a sequence of key-down/key-up pairs.
    pub fn type_text(&self, text: &str) -> Vec<Verdict> {
        let mut verdicts = Vec::new();
        for c in text.chars() {
            let event = match c {
                ' ' => KeyEvent::down(KeyToken::new("space"), Some(' ')),
                '\n' => KeyEvent::down(KeyToken::new("enter"), None),
                '\t' => KeyEvent::down(KeyToken::new("tab"), None),
                '\u{8}' => KeyEvent::down(KeyToken::new("backspace"), None),
                c => KeyEvent::char_down(c),
            };
            let key = event.key.clone();
            verdicts.push(self.feed(&event));
            verdicts.push(self.feed(&KeyEvent::up(key)));
        }
        verdicts
    }

    /// Let a key go without delivering its key-up, as when the lock screen
    /// or another hook eats it.
    pub fn release_unseen(&self, key: &str) {
        self.state.lock().pressed.remove(&KeyToken::new(key));
    }

    /// Triggers currently claimed, in claim order.
    pub fn claimed(&self) -> Vec<Trigger> {
        self.state.lock().claimed.clone()
    }

    /// How many times a hook has been installed over this backend's lifetime.
    pub fn install_count(&self) -> usize {
        self.state.lock().install_count
    }
}

impl HookBackend for SimulatedHook {
    fn install(&mut self, sink: KeySink) -> Result<(), HookError> {
        let mut state = self.state.lock();
        if state.sink.is_some() {
            return Err(HookError::AlreadyInstalled);
        }
        state.sink = Some(sink);
        state.install_count += 1;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.state.lock().sink = None;
    }

    fn is_installed(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    fn claim(&mut self, trigger: &Trigger) -> Result<(), HookError> {
        let mut state = self.state.lock();
        if state.taken.contains(trigger) {
            return Err(HookError::Conflict {
                trigger: trigger.format(),
                reason: "registered by another application".to_string(),
            });
        }
        state.claimed.push(trigger.clone());
        Ok(())
    }

    fn release_all(&mut self) {
        self.state.lock().claimed.clear();
    }

    fn key_state(&self) -> Option<KeyStateFn> {
        let state = Arc::clone(&self.state);
        let is_down: KeyStateFn = Arc::new(move |key: &KeyToken| state.lock().pressed.contains(key));
        Some(is_down)
    }
}
