//! hotwire - global hotkeys and text expansion
//!
//! One low-level keyboard hook feeds two independent subscribers: a hotkey
//! dispatcher that maps key combinations to actions and a snippet matcher
//! that replaces typed abbreviations with longer text.

pub mod actions;
pub mod config;
pub mod engine;
pub mod error;
pub mod hook;
pub mod hotkeys;
pub mod logging;
pub mod snippets;
pub mod trigger;
pub mod watcher;
pub mod worker;

pub use actions::{ActionInvoker, ActionSpec, SystemInvoker, TextInjector, TextInjectorConfig};
pub use config::{BindingSource, Config, ConfigFile, EngineSettings};
pub use engine::{HookEngine, HookState, RegistrationReport};
pub use error::{EngineError, ResultExt};
pub use hook::{HookBackend, KeyEvent, SimulatedHook, Verdict};
pub use trigger::{KeyToken, Trigger};
