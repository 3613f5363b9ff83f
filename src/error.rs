use thiserror::Error;
use tracing::{error, warn};

pub use crate::actions::ActionError;
pub use crate::hook::HookError;
pub use crate::trigger::TriggerParseError;

/// Why a config record could not become a binding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("binding has an empty trigger")]
    EmptyTrigger,

    #[error("unknown action type '{0}'")]
    UnknownActionType(String),
}

impl From<TriggerParseError> for BindingError {
    fn from(err: TriggerParseError) -> Self {
        match err {
            TriggerParseError::Empty => BindingError::EmptyTrigger,
        }
    }
}

/// Engine lifecycle errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine is not running")]
    NotRunning,

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and nobody upstream can act on it.
///
/// Includes file/line information using `#[track_caller]`.
///
/// # Examples
///
/// ```ignore
/// use hotwire::error::ResultExt;
///
/// // Log and continue if the action fails
/// invoker.invoke(&action).log_err();
///
/// // Log as warning for expected failures
/// watcher.start().warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = %error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = %error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

/// Best-effort message from a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
