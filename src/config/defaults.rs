//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Directory under the home directory holding config and logs
pub const APP_DIR_NAME: &str = ".hotwire";

/// Config file name inside the app directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable overriding the config path
pub const CONFIG_PATH_ENV: &str = "HOTWIRE_CONFIG";

/// Default state for bindings without an `active` field
pub const DEFAULT_ACTIVE: bool = true;
pub const DEFAULT_SUPPRESS: bool = false;

/// Text replacement timing (milliseconds)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 50;
pub const DEFAULT_PASTE_DELAY_MS: u64 = 50;
pub const DEFAULT_CHAR_DELAY_MS: u64 = 5;

/// The clipboard keeps the replacement text after an expansion unless enabled
pub const DEFAULT_RESTORE_CLIPBOARD: bool = false;

/// Pending actions allowed before new ones are dropped
pub const DEFAULT_ACTION_QUEUE_CAPACITY: usize = 64;

/// Debounce window for config file change events
pub const DEFAULT_RELOAD_DEBOUNCE_MS: u64 = 500;
