//! Logging setup
//!
//! Events go to two places: a JSON log file written through a non-blocking
//! appender, and a compact human readable stream on stderr. The filter comes
//! from `RUST_LOG` when set, otherwise from the configured level.

use std::ffi::OsStr;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_FILE: &str = "lib-updater.log";

/// Initialize the global subscriber.
///
/// The returned guard flushes the log file when dropped and must be kept alive
/// for as long as logging is needed.
pub fn init_logging(log_path: &Path, default_level: &str) -> io::Result<WorkerGuard> {
    let (log_dir, file_name) = split_log_path(log_path);
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(guard)
}

fn split_log_path(log_path: &Path) -> (&Path, &OsStr) {
    let log_dir = log_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = log_path
        .file_name()
        .unwrap_or(OsStr::new(DEFAULT_LOG_FILE));
    (log_dir, file_name)
}
