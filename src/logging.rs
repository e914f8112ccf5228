//! File logging.
//!
//! The terminal belongs to the TUI, so log records go to a file. The level
//! comes from `RUST_LOG` and defaults to `info`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "slowquery-console.log";

const DEFAULT_LEVEL: &str = "info";

/// Install the global subscriber writing to `path`.
///
/// The returned guard flushes buffered records when dropped and must be
/// held until the program exits. A subscriber that is already installed
/// (e.g. by a test harness) is left in place.
pub fn init_logging(path: &Path) -> Result<WorkerGuard> {
    let (dir, file_name) = split_path(path)?;
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }

    let file_appender = tracing_appender::rolling::never(&dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_level(true)
            .with_ansi(false)
            .with_filter(filter),
    );

    if subscriber.try_init().is_err() {
        tracing::debug!("Global tracing subscriber already initialized");
    }

    tracing::info!(
        log_file = %path.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Logging initialized"
    );

    Ok(guard)
}

/// Directory and file name of a log path. A bare file name logs into the
/// working directory.
fn split_path(path: &Path) -> Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid log file path: {}", path.display()))?
        .to_string();
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((dir, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        let (dir, name) = split_path(Path::new("logs/console.log")).unwrap();
        assert_eq!(dir, PathBuf::from("logs"));
        assert_eq!(name, "console.log");

        let (dir, name) = split_path(Path::new("console.log")).unwrap();
        assert!(dir.as_os_str().is_empty());
        assert_eq!(name, "console.log");

        assert!(split_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_init_logging_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("console.log");

        let guard = init_logging(&path).unwrap();
        tracing::info!("hello");
        drop(guard);

        assert!(dir.path().join("nested").is_dir());
        assert!(path.exists());
    }
}
