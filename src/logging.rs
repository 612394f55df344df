//! Logging setup.
//!
//! Each process writes to its own file under the logs directory: one per
//! deck session, plus `menu.log` for the menu. Console echo and JSON
//! output are optional.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "deckwatch=info";
const JSON_ENV: &str = "DECKWATCH_LOG_JSON";
pub const MENU_LOG_STEM: &str = "menu";

/// Name of the log file for a given stem.
pub fn log_file_name(stem: &str) -> String {
    format!("{stem}.log")
}

/// Install the global subscriber writing to `<logs_dir>/<stem>.log`.
///
/// The returned guard flushes the file writer on drop and must be held
/// for the life of the process.
pub fn init(logs_dir: &Path, stem: &str, cfg: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create {}", logs_dir.display()))?;

    let appender = tracing_appender::rolling::never(logs_dir, log_file_name(stem));
    let (file, guard) = tracing_appender::non_blocking(appender);

    let writer = if cfg.tail {
        BoxMakeWriter::new(file.and(std::io::stdout))
    } else {
        BoxMakeWriter::new(file)
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json_logging = cfg.json || std::env::var(JSON_ENV).is_ok();

    let installed = if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_target(true)
            .try_init()
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .try_init()
    };
    installed.map_err(|e| anyhow!("Failed to initialise logging: {e}"))?;

    Ok(guard)
}

/// Contents of every `.log` file in the logs directory, ordered by name.
pub fn collect_logs(logs_dir: &Path) -> Result<Vec<(String, String)>> {
    if !logs_dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(logs_dir)
        .with_context(|| format!("Failed to list {}", logs_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("log"))
        .collect();
    files.sort();

    files
        .into_iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let body = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok((name, body))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name() {
        assert_eq!(log_file_name("Krenko"), "Krenko.log");
        assert_eq!(log_file_name(MENU_LOG_STEM), "menu.log");
    }

    #[test]
    fn test_collect_logs_only_log_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.log"), "second").unwrap();
        std::fs::write(dir.path().join("a.log"), "first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let logs = collect_logs(dir.path()).unwrap();
        assert_eq!(
            logs,
            vec![
                ("a.log".to_string(), "first".to_string()),
                ("b.log".to_string(), "second".to_string()),
            ]
        );
    }

    #[test]
    fn test_collect_logs_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_logs(&dir.path().join("nope")).unwrap().is_empty());
    }
}
