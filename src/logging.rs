use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_DIR: &str = "./logs";
const LOG_FILE_PREFIX: &str = "adaptive-tutor.log";

/// Keeps the non-blocking file writer flushing until dropped.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directives, e.g. `info,adaptive_tutor=debug`.
    pub level: String,
    /// Daily-rotated log files go here when set.
    pub file_dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file_dir: None,
        }
    }
}

impl LogSettings {
    /// `RUST_LOG` sets the level. Files are written only when
    /// `ENABLE_FILE_LOGS` is truthy, under `LOG_DIR` or `./logs`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let level = non_blank("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let file_dir = non_blank("ENABLE_FILE_LOGS")
            .is_some_and(|v| is_truthy(&v))
            .then(|| non_blank("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()))
            .map(PathBuf::from);

        Self { level, file_dir }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn file_writer(dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("failed to create log directory {}: {err}", dir.display());
        return None;
    }
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(appender))
}

/// Logs go to stderr so the binary's JSON report on stdout stays clean. An
/// unusable log directory leaves console logging only.
pub fn init_tracing(settings: &LogSettings) -> Option<FileLogGuard> {
    let env_filter =
        EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let (writer, guard) = match settings.file_dir.as_deref().and_then(file_writer) {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };
    let file_layer = writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
    });

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("tracing already initialised: {err}");
    }

    guard.map(|guard| FileLogGuard { _guard: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(LogSettings::from_lookup(|_| None), LogSettings::default());
    }

    #[test]
    fn test_file_logging_flag() {
        let enabled = LogSettings::from_lookup(|key| match key {
            "ENABLE_FILE_LOGS" => Some("TRUE".to_string()),
            "RUST_LOG" => Some("debug".to_string()),
            _ => None,
        });
        assert_eq!(enabled.level, "debug");
        assert_eq!(enabled.file_dir, Some(PathBuf::from(DEFAULT_LOG_DIR)));

        let disabled = LogSettings::from_lookup(|key| match key {
            "ENABLE_FILE_LOGS" => Some("0".to_string()),
            "LOG_DIR" => Some("/tmp/tutor-logs".to_string()),
            _ => None,
        });
        assert!(disabled.file_dir.is_none());
    }

    #[test]
    fn test_log_dir_override() {
        let settings = LogSettings::from_lookup(|key| match key {
            "ENABLE_FILE_LOGS" => Some("1".to_string()),
            "LOG_DIR" => Some("/var/log/tutor".to_string()),
            "RUST_LOG" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(settings.level, DEFAULT_LOG_LEVEL);
        assert_eq!(settings.file_dir, Some(PathBuf::from("/var/log/tutor")));
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("logs");
        let writer = file_writer(&dir);
        assert!(writer.is_some());
        assert!(dir.is_dir());
    }
}
