//! Logging setup.
//!
//! Every session logs to two places:
//! - the configured log file (default `~/.birdseye/birdseye.log`), truncated
//!   when the session starts
//! - stdout, for watching a run from the terminal
//!
//! The level defaults to `info` and follows `RUST_LOG` when it is set. The
//! `debug` flag overrides both.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    log_file: PathBuf,
}

impl LoggingGuard {
    /// The file this session logs to.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

/// Initialize logging to `log_file` and stdout.
///
/// Creates the parent directory if needed and clears any previous log.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the log file
/// cannot be cleared.
pub fn init_logging(log_file: &Path, debug: bool) -> Result<LoggingGuard, io::Error> {
    let (log_dir, file_name) = split_log_path(log_file)?;
    prepare_log_file(&log_dir, &file_name)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(false);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(debug))
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_file: log_dir.join(file_name),
    })
}

fn env_filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Splits a log path into directory and file name.
fn split_log_path(log_file: &Path) -> Result<(PathBuf, String), io::Error> {
    let file_name = log_file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("log file path has no file name: {}", log_file.display()),
            )
        })?
        .to_string();
    let log_dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((log_dir, file_name))
}

/// Creates the log directory and truncates the log file.
fn prepare_log_file(log_dir: &Path, file_name: &str) -> Result<(), io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(file_name), "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/birdseye.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(name, "birdseye.log");

        let (dir, name) = split_log_path(Path::new("birdseye.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "birdseye.log");
    }

    #[test]
    fn test_split_rejects_directory_only_path() {
        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_prepare_creates_nested_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("deep").join("nested");

        prepare_log_file(&dir, "test.log").unwrap();

        let contents = fs::read_to_string(dir.join("test.log")).unwrap();
        assert_eq!(contents, "");
    }

    #[test]
    fn test_prepare_clears_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("test.log");
        fs::write(&path, "old log data").unwrap();

        prepare_log_file(temp.path(), "test.log").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_guard_structure() {
        use tracing_appender::non_blocking::NonBlocking;

        let (non_blocking, guard) = NonBlocking::new(std::io::sink());
        drop(non_blocking);

        let logging_guard = LoggingGuard {
            _file_guard: guard,
            log_file: PathBuf::from("test.log"),
        };
        assert_eq!(logging_guard.log_file(), Path::new("test.log"));
    }

    // The global subscriber can only be installed once per process, so
    // init_logging itself is exercised by the CLI rather than here.
}
