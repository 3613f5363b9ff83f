//! Configuration loading from file system
//!
//! The engine never writes the config; it only reads it through a
//! `BindingSource`.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use super::defaults::{APP_DIR_NAME, CONFIG_FILE_NAME, CONFIG_PATH_ENV};
use super::types::{Config, HotkeyRecord, SnippetRecord};

/// Where hotkeys and snippets come from.
pub trait BindingSource: Send {
    fn hotkeys(&self) -> Vec<HotkeyRecord>;
    fn snippets(&self) -> Vec<SnippetRecord>;

    /// Hotkeys and snippets taken from a single read of the source.
    fn bindings(&self) -> (Vec<HotkeyRecord>, Vec<SnippetRecord>) {
        (self.hotkeys(), self.snippets())
    }
}

/// An in-memory config is its own binding source.
impl BindingSource for Config {
    fn hotkeys(&self) -> Vec<HotkeyRecord> {
        self.hotkeys.clone()
    }

    fn snippets(&self) -> Vec<SnippetRecord> {
        self.snippets.clone()
    }
}

/// A config file re-read on every call, so edits show up on the next reload.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Config {
        load_config(&self.path)
    }
}

impl BindingSource for ConfigFile {
    fn hotkeys(&self) -> Vec<HotkeyRecord> {
        self.load().hotkeys
    }

    fn snippets(&self) -> Vec<SnippetRecord> {
        self.load().snippets
    }

    fn bindings(&self) -> (Vec<HotkeyRecord>, Vec<SnippetRecord>) {
        let config = self.load();
        (config.hotkeys, config.snippets)
    }
}

/// `~/.hotwire`, or `./.hotwire` when no home directory is known.
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// `$HOTWIRE_CONFIG` (tilde-expanded) or `~/.hotwire/config.json`.
pub fn default_config_path() -> PathBuf {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(raw) if !raw.trim().is_empty() => {
            PathBuf::from(shellexpand::tilde(raw.trim()).as_ref())
        }
        _ => app_dir().join(CONFIG_FILE_NAME),
    }
}

/// Load configuration from a JSON file.
///
/// Returns `Config::default()` if the file is missing, unreadable or not
/// valid JSON for the expected shape.
#[instrument(name = "load_config", skip_all, fields(path = %path.display()))]
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        info!("Config file not found, using defaults");
        return Config::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(error = %e, "Failed to read config file, using defaults");
            return Config::default();
        }
    };

    match serde_json::from_str::<Config>(&contents) {
        Ok(config) => {
            info!(
                hotkey_count = config.hotkeys.len(),
                snippet_count = config.snippets.len(),
                "Successfully loaded config"
            );
            config
        }
        Err(e) => {
            warn!(
                error = %e,
                line = e.line(),
                column = e.column(),
                "Failed to parse config JSON, using defaults"
            );
            Config::default()
        }
    }
}
