use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info, instrument, warn};

use super::injector::TextInjector;
use super::window_system::{find_window, native_windows, WindowSystem};
use super::{ActionError, ActionInvoker};

/// Executes actions against the real desktop.
pub struct SystemInvoker {
    windows: Box<dyn WindowSystem>,
    injector: TextInjector,
}

impl SystemInvoker {
    pub fn new(injector: TextInjector) -> Self {
        Self::with_windows(native_windows(), injector)
    }

    pub fn with_windows(windows: Box<dyn WindowSystem>, injector: TextInjector) -> Self {
        Self { windows, injector }
    }
}

impl ActionInvoker for SystemInvoker {
    #[instrument(skip(self))]
    fn run(&self, target: &str) -> Result<(), ActionError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ActionError::NotFound(String::new()));
        }

        let expanded = shellexpand::tilde(target).into_owned();
        if Path::new(&expanded).exists() {
            match open::that_detached(&expanded) {
                Ok(()) => {
                    info!(target = %expanded, "Opened path");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, target = %expanded, "Default handler failed, trying shell");
                }
            }
            return spawn_shell(&expanded);
        }

        if names_missing_file(&expanded) {
            return Err(ActionError::NotFound(target.to_string()));
        }
        // Shell syntax is only understood by the shell; failures show up in the exit status.
        spawn_shell(&expanded)
    }

    #[instrument(skip(self))]
    fn focus_window(&self, title: &str) -> Result<bool, ActionError> {
        let windows = self.windows.windows()?;
        let Some(window) = find_window(&windows, title) else {
            debug!(window_count = windows.len(), "No window title matched");
            return Ok(false);
        };

        if window.minimized {
            self.windows.restore(window.id)?;
        }
        self.windows.activate(window.id)?;
        info!(window_title = %window.title, "Focused window");
        Ok(true)
    }

    #[instrument(skip(self))]
    fn open_url(&self, url: &str) -> Result<(), ActionError> {
        let url = normalize_url(url);
        open::that_detached(&url).map_err(|source| ActionError::Open {
            target: url.clone(),
            source,
        })?;
        info!(url = %url, "Opened URL");
        Ok(())
    }

    fn replace_text(&self, typed_trigger: &str, replacement: &str) -> Result<(), ActionError> {
        self.injector
            .replace(typed_trigger.chars().count() + 1, replacement)
    }
}

/// Prefix `https://` when the URL carries no scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") || url.starts_with("mailto:") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// The program part of a command line, honoring a leading quoted path.
fn first_word(command: &str) -> &str {
    if let Some(rest) = command.strip_prefix('"') {
        return rest.split('"').next().unwrap_or(rest);
    }
    command.split_whitespace().next().unwrap_or(command)
}

/// True when the command's program is written as a path that does not exist.
///
/// Bare names are left to the shell, which knows its own builtins.
fn names_missing_file(command: &str) -> bool {
    let program = first_word(command);
    let path_like = program.contains('/') || program.contains('\\');
    path_like && !Path::new(program).exists() && which::which(program).is_err()
}

/// Start `command` through the platform shell without waiting for it.
fn spawn_shell(command: &str) -> Result<(), ActionError> {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| ActionError::Launch {
            target: command.to_string(),
            source,
        })?;

    let pid = child.id();
    info!(pid, command = %command, "Launched command");

    // Reap in the background so finished children do not linger.
    let _ = std::thread::Builder::new()
        .name("hotwire-reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) if status.success() => debug!(pid, "Command finished"),
            Ok(status) => warn!(pid, %status, "Command exited with failure"),
            Err(e) => warn!(pid, error = %e, "Failed to wait for command"),
        });
    Ok(())
}
