//! Structured JSONL logging plus human-readable stderr output.
//!
//! - **JSONL to file** (`~/.hotwire/logs/hotwire.jsonl`), one event per line
//! - **Compact to stderr** for whoever runs the binary in a terminal
//!
//! # Usage
//!
//! ```rust,ignore
//! // Keep the guard alive for the duration of the program
//! let _guard = hotwire::logging::init(false);
//! tracing::info!(event_type = "app_lifecycle", "Started");
//! ```
//!
//! # JSONL Output Format
//!
//! ```json
//! {"timestamp":"2026-01-05T10:30:45.123Z","level":"INFO","target":"hotwire::engine","fields":{"message":"Hook engine running","hotkey_count":3}}
//! ```
//!
//! `RUST_LOG` overrides the default filter.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::app_dir;

const LOG_FILE_NAME: &str = "hotwire.jsonl";
const DEFAULT_FILTER: &str = "info";
const VERBOSE_FILTER: &str = "debug";

/// Flushes the file writer when dropped.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the dual-output logging system.
///
/// If the log file cannot be opened, logging continues on stderr only.
pub fn init(verbose: bool) -> LoggingGuard {
    let log_path = log_path();
    let file = log_path
        .parent()
        .map(fs::create_dir_all)
        .transpose()
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&log_path));

    let (file_writer, file_guard) = match file {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            (Some(writer), Some(guard))
        }
        Err(e) => {
            eprintln!("[hotwire] Failed to open log file {}: {}", log_path.display(), e);
            (None, None)
        }
    };

    let json_layer = file_writer.map(|writer| {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_timer(UtcTime::rfc_3339())
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::NONE)
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(UtcTime::new(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:3]"
        )))
        .with_target(false)
        .compact();

    let result = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(json_layer)
        .with(stderr_layer)
        .try_init();
    if let Err(e) = result {
        eprintln!("[hotwire] Logging already initialized: {}", e);
    }

    tracing::info!(
        event_type = "app_lifecycle",
        action = "started",
        log_path = %log_path.display(),
        "Logging initialized"
    );

    LoggingGuard {
        _file_guard: file_guard,
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// `~/.hotwire/logs`
pub fn log_dir() -> PathBuf {
    app_dir().join("logs")
}

/// Path of the JSONL log file.
pub fn log_path() -> PathBuf {
    log_dir().join(LOG_FILE_NAME)
}
