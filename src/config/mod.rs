//! Configuration module - Bindings and engine settings
//!
//! This module provides functionality for:
//! - Loading hotkeys and snippets from ~/.hotwire/config.json
//! - Default values for all settings
//! - The `BindingSource` seam the engine reads bindings through
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - Record and settings struct definitions
//! - `loader` - File system loading, paths and binding sources

mod defaults;
mod loader;
mod types;

pub use defaults::{
    APP_DIR_NAME, CONFIG_FILE_NAME, CONFIG_PATH_ENV, DEFAULT_ACTION_QUEUE_CAPACITY,
    DEFAULT_RELOAD_DEBOUNCE_MS,
};

pub use types::{Config, EngineSettings, HotkeyRecord, SnippetRecord};

pub use loader::{app_dir, default_config_path, load_config, BindingSource, ConfigFile};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
