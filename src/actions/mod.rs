//! Action invocation.
//!
//! Hotkeys carry an `ActionSpec`; snippets produce an `Expansion`. Both are
//! executed through the `ActionInvoker` trait so the engine never touches the
//! OS directly and tests can record invocations instead.
//!
//! ## Module Structure
//! - `invoker`: `SystemInvoker`, the real implementation
//! - `injector`: Erase-and-paste text replacement
//! - `window_system`: Top-level window enumeration and activation

mod injector;
mod invoker;
mod window_system;

use std::fmt;

use thiserror::Error;
use tracing::info;

pub use injector::{TextInjector, TextInjectorConfig};
pub use invoker::{normalize_url, SystemInvoker};
pub use window_system::{find_window, native_windows, NoopWindows, WindowId, WindowInfo, WindowSystem};

#[cfg(target_os = "windows")]
pub use window_system::NativeWindows;

/// What a hotkey does when it fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionSpec {
    /// Launch a program, open a document or a folder.
    RunPath(String),
    /// Bring the first window whose title contains this text to the front.
    FocusWindow(String),
    /// Open a URL in the default browser.
    OpenUrl(String),
}

impl ActionSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunPath(_) => "run",
            Self::FocusWindow(_) => "focus",
            Self::OpenUrl(_) => "open_url",
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::RunPath(t) | Self::FocusWindow(t) | Self::OpenUrl(t) => t,
        }
    }
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target())
    }
}

/// Failures raised while executing an action.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("'{0}' is neither an existing path nor a command on PATH")]
    NotFound(String),

    #[error("failed to launch '{target}': {source}")]
    Launch {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open '{target}': {source}")]
    Open {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("window operation failed: {0}")]
    Window(String),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("keystroke injection failed: {0}")]
    Input(String),
}

/// Executes actions on behalf of the engine.
///
/// Implementations run on the action worker thread, never inside the hook.
pub trait ActionInvoker: Send + Sync {
    fn run(&self, target: &str) -> Result<(), ActionError>;

    /// Returns `Ok(false)` when no window title matches.
    fn focus_window(&self, title: &str) -> Result<bool, ActionError>;

    fn open_url(&self, url: &str) -> Result<(), ActionError>;

    /// Erase the typed trigger plus its delimiter, then insert `replacement`.
    fn replace_text(&self, typed_trigger: &str, replacement: &str) -> Result<(), ActionError>;

    fn invoke(&self, action: &ActionSpec) -> Result<(), ActionError> {
        match action {
            ActionSpec::RunPath(target) => self.run(target),
            ActionSpec::OpenUrl(url) => self.open_url(url),
            ActionSpec::FocusWindow(title) => {
                if !self.focus_window(title)? {
                    info!(title = %title, "No window matched focus request");
                }
                Ok(())
            }
        }
    }
}
