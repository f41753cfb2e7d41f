//! Logging setup.
//!
//! Events go to a log file through a non-blocking writer and to stderr with
//! local timestamps. Verbosity comes from `RUST_LOG`, defaulting to `info`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILE: &str = "tilepyramid.log";

/// Keeps the file writer alive; dropping it flushes and closes the log.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    log_path: PathBuf,
}

impl LoggingGuard {
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

/// Installs the global subscriber. The log file is truncated on start.
///
/// Fails if the directory cannot be created or a subscriber is already set.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(log_file);
    fs::write(&log_path, "")?;

    let appender = tracing_appender::rolling::never(log_dir, log_file);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_timer(timer.clone())
        .with_thread_names(true);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_timer(timer)
        .compact();

    tracing_subscriber::registry()
        .with(default_filter())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_path,
    })
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// `<config dir>/logs`.
pub fn default_log_dir() -> PathBuf {
    crate::config::config_directory().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_paths() {
        assert!(default_log_dir().ends_with(".tilepyramid/logs"));
        assert_eq!(DEFAULT_LOG_FILE, "tilepyramid.log");
    }

    #[test]
    fn test_init_truncates_log_file() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");
        fs::create_dir_all(&log_dir).unwrap();
        fs::write(log_dir.join("test.log"), "old data").unwrap();

        // Only one test may install the global subscriber
        let guard = init_logging(&log_dir, "test.log").unwrap();
        assert_eq!(guard.log_path(), log_dir.join("test.log"));
        assert!(!fs::read_to_string(guard.log_path())
            .unwrap()
            .contains("old data"));

        let second = init_logging(&log_dir, "test.log");
        assert!(second.is_err());
    }
}
