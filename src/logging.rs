//! Where ephemera's diagnostics go.
//!
//! The command prints photos and ids on stdout, so log lines never share it.
//! On Linux they go to the systemd journal when it is reachable; everywhere
//! else, and when the journal is not running, they go to `ephemera.log` in a
//! daily-rolling directory.

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt as layer_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::library::LibraryConfig;

/// Environment variable holding the `EnvFilter` directive, e.g. `ephemera=debug`.
pub const LOG_ENV: &str = "EPHEMERA_LOG";

const LOG_FILE: &str = "ephemera.log";

/// Keeps the file writer flushing for the life of the process.
static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where [`init`] sent the log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogBackend {
    Journald,
    /// Directory holding the rolling `ephemera.log` files.
    File(PathBuf),
}

impl fmt::Display for LogBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogBackend::Journald => f.write_str("journald"),
            LogBackend::File(dir) => write!(f, "{}", dir.join(LOG_FILE).display()),
        }
    }
}

/// `ephemera/logs` under the platform's local data directory.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ephemera")
        .join("logs")
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber and report which backend took the output.
pub fn init(log_dir: Option<PathBuf>) -> Result<LogBackend> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(journald_layer.with_syslog_identifier("ephemera".to_string()))
                .try_init()?;
            return Ok(LogBackend::Journald);
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(layer_fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    Ok(LogBackend::File(log_dir))
}

/// One line per run saying which store is in use and how long photos live,
/// so a log can be matched to the database it describes.
pub fn log_session(backend: &LogBackend, config: &LibraryConfig) {
    info!(
        logs = %backend,
        store = %config.location,
        retention_secs = config.retention.num_seconds(),
        "ephemera starting"
    );
}
