//! Config file watcher.
//!
//! Watches the directory containing the config file (editors often replace
//! the file rather than write it in place) and emits one `Reload` per burst
//! of changes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use notify::{recommended_watcher, EventKind, RecommendedWatcher, RecursiveMode, Result as NotifyResult, Watcher};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_RELOAD_DEBOUNCE_MS;

/// How often the watch thread checks for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Event emitted when the config needs to be reloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigReloadEvent {
    Reload,
}

/// Watches one config file and emits reload events.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    tx: Option<Sender<ConfigReloadEvent>>,
    stop: Arc<AtomicBool>,
    watcher_thread: Option<thread::JoinHandle<()>>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiver its reload events arrive on.
    pub fn new(path: impl Into<PathBuf>) -> (Self, Receiver<ConfigReloadEvent>) {
        Self::with_debounce(path, Duration::from_millis(DEFAULT_RELOAD_DEBOUNCE_MS))
    }

    pub fn with_debounce(
        path: impl Into<PathBuf>,
        debounce: Duration,
    ) -> (Self, Receiver<ConfigReloadEvent>) {
        let (tx, rx) = channel();
        let watcher = ConfigWatcher {
            path: path.into(),
            debounce,
            tx: Some(tx),
            stop: Arc::new(AtomicBool::new(false)),
            watcher_thread: None,
        };
        (watcher, rx)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start watching on a background thread.
    ///
    /// Fails if the watcher was already started or the directory cannot be
    /// watched.
    pub fn start(&mut self) -> NotifyResult<()> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;
        let watch_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let tx = self
            .tx
            .take()
            .ok_or_else(|| std::io::Error::other("watcher already started"))?;

        let (watch_tx, watch_rx) = channel();
        let mut watcher = recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = watch_tx.send(res);
        })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        info!(
            path = %watch_dir.display(),
            target = ?file_name,
            "Config watcher started"
        );

        let stop = Arc::clone(&self.stop);
        let debounce = self.debounce;
        let handle = thread::Builder::new()
            .name("hotwire-config-watch".to_string())
            .spawn(move || watch_loop(watcher, watch_rx, tx, file_name, debounce, stop))?;

        self.watcher_thread = Some(handle);
        Ok(())
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.watcher_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Only creations and modifications of the config file itself count.
fn is_config_event(event: &notify::Event, file_name: &OsString) -> bool {
    let relevant_kind = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    relevant_kind
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

fn watch_loop(
    // Held so the OS watch stays registered until the loop exits.
    _watcher: RecommendedWatcher,
    watch_rx: Receiver<notify::Result<notify::Event>>,
    tx: Sender<ConfigReloadEvent>,
    file_name: OsString,
    debounce: Duration,
    stop: Arc<AtomicBool>,
) {
    let mut pending: Option<Instant> = None;

    while !stop.load(Ordering::SeqCst) {
        match watch_rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                if is_config_event(&event, &file_name) && pending.is_none() {
                    debug!(kind = ?event.kind, "Config change detected, debouncing");
                    pending = Some(Instant::now() + debounce);
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, watcher = "config", "File watcher error");
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if pending.is_some_and(|deadline| Instant::now() >= deadline) {
            pending = None;
            if tx.send(ConfigReloadEvent::Reload).is_err() {
                break;
            }
            info!("Config file changed, emitting reload event");
        }
    }

    info!(watcher = "config", "Config watcher shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::fs;

    fn event(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_only_config_file_changes_are_relevant() {
        let name = OsString::from("config.json");

        assert!(is_config_event(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/.hotwire/config.json"),
            &name
        ));
        assert!(is_config_event(
            &event(EventKind::Create(CreateKind::File), "/home/u/.hotwire/config.json"),
            &name
        ));
        assert!(!is_config_event(
            &event(EventKind::Remove(RemoveKind::File), "/home/u/.hotwire/config.json"),
            &name
        ));
        assert!(!is_config_event(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/.hotwire/logs/hotwire.jsonl"),
            &name
        ));
    }

    #[test]
    fn test_start_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (mut watcher, _rx) = ConfigWatcher::new(dir.path().join("config.json"));
        watcher.start().unwrap();
        assert!(watcher.start().is_err());
    }

    #[test]
    fn test_write_burst_emits_single_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (mut watcher, rx) = ConfigWatcher::with_debounce(&path, Duration::from_millis(300));
        watcher.start().unwrap();

        fs::write(&path, "{}").unwrap();
        fs::write(&path, r#"{"hotkeys": []}"#).unwrap();
        fs::write(dir.path().join("unrelated.txt"), "x").unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(10)),
            Ok(ConfigReloadEvent::Reload)
        );
        assert!(rx.recv_timeout(Duration::from_millis(600)).is_err());
    }

    #[test]
    fn test_drop_stops_thread() {
        let dir = tempfile::tempdir().unwrap();
        let (mut watcher, rx) = ConfigWatcher::new(dir.path().join("config.json"));
        watcher.start().unwrap();
        drop(watcher);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)),
            Err(RecvTimeoutError::Disconnected)
        );
    }
}
