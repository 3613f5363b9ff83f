//! OS keyboard hook backends.
//!
//! A backend delivers every physical key event to a single sink and applies
//! the sink's verdict (swallow or pass through). The engine owns exactly one
//! backend; backends refuse to install a second hook.
//!
//! # Module Structure
//!
//! - `probe` - Hotkey conflict detection through `global-hotkey`
//! - `simulated` - Scripted backend for tests and dry runs
//! - `windows` - `WH_KEYBOARD_LL` backend (Windows only)

mod probe;
pub mod simulated;
#[cfg(target_os = "windows")]
mod windows;

use std::sync::Arc;

use thiserror::Error;

use crate::trigger::{KeyToken, Trigger};

pub use probe::probe_conflict;
pub use simulated::SimulatedHook;
#[cfg(target_os = "windows")]
pub use windows::WindowsHook;

/// Errors raised by hook backends.
#[derive(Error, Debug)]
pub enum HookError {
    #[error("a keyboard hook is already installed")]
    AlreadyInstalled,

    #[error("failed to install keyboard hook: {0}")]
    Install(String),

    #[error("hotkey '{trigger}' is already claimed: {reason}")]
    Conflict { trigger: String, reason: String },

    #[error("keyboard hooks are not supported on this platform")]
    Unsupported,
}

/// Whether a key went down or came up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// One physical key event as seen by the hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyToken,
    pub direction: KeyDirection,
    /// The printable character the key produces, case preserved.
    pub character: Option<char>,
    /// Synthetic events (our own injected keystrokes) are never matched.
    pub injected: bool,
}

impl KeyEvent {
    pub fn down(key: KeyToken, character: Option<char>) -> Self {
        Self {
            key,
            direction: KeyDirection::Down,
            character,
            injected: false,
        }
    }

    pub fn up(key: KeyToken) -> Self {
        Self {
            key,
            direction: KeyDirection::Up,
            character: None,
            injected: false,
        }
    }

    /// Key-down for a plain character key, e.g. `'o'` or `'O'`.
    pub fn char_down(c: char) -> Self {
        Self::down(KeyToken::new(&c.to_string()), Some(c))
    }

    pub fn is_down(&self) -> bool {
        self.direction == KeyDirection::Down
    }
}

/// Result returned to the OS for one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Verdict {
    #[default]
    Pass,
    Suppress,
}

impl Verdict {
    pub fn is_suppress(self) -> bool {
        self == Verdict::Suppress
    }
}

/// Callback invoked synchronously for every key event.
pub type KeySink = Arc<dyn Fn(&KeyEvent) -> Verdict + Send + Sync>;

/// Whether a key is physically down right now, independent of delivered events.
pub type KeyStateFn = Arc<dyn Fn(&KeyToken) -> bool + Send + Sync>;

/// A process-wide keyboard hook.
pub trait HookBackend: Send {
    /// Install the OS hook and start delivering events to `sink`.
    fn install(&mut self, sink: KeySink) -> Result<(), HookError>;

    /// Remove the OS hook. No event reaches the sink after this returns.
    fn uninstall(&mut self);

    fn is_installed(&self) -> bool;

    /// Claim a combination system-wide, failing if another process owns it.
    fn claim(&mut self, trigger: &Trigger) -> Result<(), HookError>;

    /// Release every claim made through `claim`.
    fn release_all(&mut self);

    /// Live key-state query, when the platform has one.
    ///
    /// Hooks can miss key-ups, for example when the lock screen takes them.
    /// The engine uses this to forget keys that are no longer down.
    fn key_state(&self) -> Option<KeyStateFn> {
        None
    }
}

/// Backend for platforms without a low-level hook implementation.
#[derive(Debug, Default)]
pub struct UnsupportedHook;

impl HookBackend for UnsupportedHook {
    fn install(&mut self, _sink: KeySink) -> Result<(), HookError> {
        Err(HookError::Unsupported)
    }

    fn uninstall(&mut self) {}

    fn is_installed(&self) -> bool {
        false
    }

    fn claim(&mut self, _trigger: &Trigger) -> Result<(), HookError> {
        Ok(())
    }

    fn release_all(&mut self) {}
}

/// The native backend for the current platform.
#[cfg(target_os = "windows")]
pub fn native() -> Box<dyn HookBackend> {
    Box::new(WindowsHook::new())
}

/// The native backend for the current platform.
#[cfg(not(target_os = "windows"))]
pub fn native() -> Box<dyn HookBackend> {
    Box::new(UnsupportedHook)
}

impl HookBackend for Box<dyn HookBackend> {
    fn install(&mut self, sink: KeySink) -> Result<(), HookError> {
        (**self).install(sink)
    }

    fn uninstall(&mut self) {
        (**self).uninstall()
    }

    fn is_installed(&self) -> bool {
        (**self).is_installed()
    }

    fn claim(&mut self, trigger: &Trigger) -> Result<(), HookError> {
        (**self).claim(trigger)
    }

    fn key_state(&self) -> Option<KeyStateFn> {
        (**self).key_state()
    }

    fn release_all(&mut self) {
        (**self).release_all()
    }
}
