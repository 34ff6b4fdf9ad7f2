//! Structured logging initialization.
//!
//! Console output is always on. A run can also be mirrored to a daily file
//! (`<dir>/<prefix>_<YYYYMMDD>.log`, appended) so burst logs survive the
//! terminal session.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{TelemetryError, TelemetryResult};

/// Where, if anywhere, to mirror log output on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Directory for log files. `None` disables the file sink.
    pub dir: Option<PathBuf>,
    /// File name prefix. Default: "volley".
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            file_prefix: "volley".to_string(),
        }
    }
}

impl LogConfig {
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }
}

/// Daily log file path for `date`.
pub fn log_file_path(dir: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("{prefix}_{}.log", date.format("%Y%m%d")))
}

/// Create `dir` if needed and open today's file for appending.
pub fn open_log_file(dir: &Path, prefix: &str, date: NaiveDate) -> TelemetryResult<File> {
    fs::create_dir_all(dir).map_err(|e| {
        TelemetryError::LoggingInit(format!("cannot create {}: {e}", dir.display()))
    })?;
    let path = log_file_path(dir, prefix, date);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| TelemetryError::LoggingInit(format!("cannot open {}: {e}", path.display())))
}

/// Initialize structured logging.
///
/// Filter comes from `RUST_LOG` (default `info,volley=debug`). Console output
/// is JSON when `RUST_ENV=production`, pretty otherwise. The file sink, when
/// configured, always writes plain single-line records without ANSI colors.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,volley=debug"));

    let is_production = std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    let json = is_production.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
    });
    let pretty = (!is_production).then(|| {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_names(true)
    });

    let file = match &config.dir {
        Some(dir) => {
            let today = chrono::Local::now().date_naive();
            let file = open_log_file(dir, &config.file_prefix, today)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(pretty)
        .with(file)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path_is_daily() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let path = log_file_path(Path::new("logs"), "volley", date);
        assert_eq!(path, Path::new("logs").join("volley_20240310.log"));
    }

    #[test]
    fn test_open_log_file_creates_dir_and_appends() {
        let dir = std::env::temp_dir().join(format!("volley-log-{}", std::process::id()));
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        {
            use std::io::Write;
            let mut first = open_log_file(&dir, "run", date).unwrap();
            writeln!(first, "one").unwrap();
            let mut second = open_log_file(&dir, "run", date).unwrap();
            writeln!(second, "two").unwrap();
        }

        let content = fs::read_to_string(log_file_path(&dir, "run", date)).unwrap();
        assert_eq!(content, "one\ntwo\n");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_default_config_has_no_file_sink() {
        let config = LogConfig::default();
        assert!(config.dir.is_none());
        assert_eq!(LogConfig::with_dir("logs").file_prefix, "volley");
    }
}
