//! CLI entry point for hotwire
//!
//! `run` installs the keyboard hook and keeps it alive until Ctrl+C;
//! `check` and `list` only read the config.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use hotwire::config::{default_config_path, load_config, ConfigFile};
use hotwire::engine::{HookEngine, RegistrationReport};
use hotwire::error::ResultExt;
use hotwire::hook::{self, probe_conflict};
use hotwire::hotkeys::{bindings_from_records, HotkeyDispatcher};
use hotwire::snippets::SnippetMatcher;
use hotwire::watcher::{ConfigReloadEvent, ConfigWatcher};
use hotwire::{logging, SystemInvoker, TextInjector, TextInjectorConfig};

/// How often the main loop checks for Ctrl+C while waiting on reloads.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "hotwire")]
#[command(author, version, about = "Global hotkeys and text expansion", long_about = None)]
struct Cli {
    /// Config file (default: $HOTWIRE_CONFIG or ~/.hotwire/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the keyboard hook and run until Ctrl+C (default)
    Run,

    /// Show what would be registered without installing a hook
    Check {
        /// Also ask the OS whether each trigger is already taken
        #[arg(long)]
        probe: bool,
    },

    /// List every binding in the config, including inactive ones
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref()),
        None => default_config_path(),
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let _guard = logging::init(cli.verbose);
            run(&config_path)
        }
        Commands::Check { probe } => {
            check(&config_path, probe);
            Ok(())
        }
        Commands::List => {
            list(&config_path);
            Ok(())
        }
    }
}

fn run(config_path: &Path) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "hotwire starting");
    let config = load_config(config_path);

    let injector = TextInjector::new(TextInjectorConfig::from(&config.settings));
    let invoker = Arc::new(SystemInvoker::new(injector));
    let mut engine = HookEngine::new(
        hook::native(),
        Box::new(ConfigFile::new(config_path)),
        invoker,
        &config.settings,
    );

    let report = engine.start().context("Failed to start hook engine")?;
    print_report(&report);

    let (mut watcher, reload_rx) = ConfigWatcher::new(config_path);
    watcher.start().warn_on_err();

    let shutdown = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let shutdown = Arc::clone(&shutdown);
        move || shutdown.store(true, Ordering::SeqCst)
    })
    .context("Failed to set Ctrl+C handler")?;

    println!("hotwire running, press Ctrl+C to stop");
    while !shutdown.load(Ordering::SeqCst) {
        match reload_rx.recv_timeout(SHUTDOWN_POLL) {
            Ok(ConfigReloadEvent::Reload) => {
                if let Some(report) = engine.reload().log_err() {
                    print_report(&report);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // Watcher unavailable; keep running without live reload.
                std::thread::sleep(SHUTDOWN_POLL);
            }
        }
    }

    info!("Shutdown requested");
    engine.stop();
    Ok(())
}

fn print_report(report: &RegistrationReport) {
    println!(
        "{} hotkey(s), {} snippet(s) registered",
        report.registered.len(),
        report.snippet_count
    );
    for skipped in &report.skipped {
        warn!(trigger = %skipped.trigger, reason = %skipped.reason, "Binding skipped");
        println!("  skipped '{}': {}", skipped.trigger, skipped.reason);
    }
}

fn check(config_path: &Path, probe: bool) {
    let config = load_config(config_path);
    println!("Config: {}\n", config_path.display());

    let (bindings, skipped) = bindings_from_records(&config.hotkeys);
    let dispatcher = HotkeyDispatcher::from_bindings(bindings);

    println!("Hotkeys ({}):", dispatcher.len());
    for trigger in dispatcher.triggers() {
        for binding in dispatcher.bindings_for(trigger) {
            let mode = if binding.suppress { "suppress" } else { "pass" };
            println!("  {:<24} {:<8} {}", trigger.label(), mode, binding.action);
        }
        if probe {
            if let Err(e) = probe_conflict(trigger) {
                println!("  {:<24} CONFLICT: {}", "", e);
            }
        }
    }
    for skipped in &skipped {
        println!("  skipped '{}': {}", skipped.trigger, skipped.reason);
    }

    let mut matcher = SnippetMatcher::new();
    matcher.reload(&config.snippets);
    println!("\nSnippets ({}):", matcher.len());
    for trigger in matcher.triggers() {
        let replacement = matcher.replacement_for(trigger).unwrap_or_default();
        println!("  {:<16} -> {}", trigger, replacement.escape_debug());
    }
}

fn list(config_path: &Path) {
    let config = load_config(config_path);
    println!("Bindings from: {}\n", config_path.display());

    println!("Hotkeys:");
    for record in &config.hotkeys {
        let state = if record.active { "active" } else { "inactive" };
        println!(
            "  {:<24} {:<8} {:<9} {}",
            record.trigger, record.kind, state, record.target
        );
    }

    println!("\nSnippets:");
    for record in &config.snippets {
        let state = if record.active { "active" } else { "inactive" };
        println!(
            "  {:<16} {:<9} {}",
            record.trigger,
            state,
            record.replacement.escape_debug()
        );
    }
}
