//! Logging setup for hotel-nlsql.
//!
//! Query results go to stdout, so logs go to stderr by default or to a file
//! under the platform state directory when `--log-file` is passed.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset. `verbose` raises it to debug.
fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("hotel_nlsql=debug,info")
        } else {
            EnvFilter::new("info")
        }
    })
}

/// Initializes logging to stderr.
pub fn init_stderr_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes logging to `path`, or to [`get_log_path`] when `None`.
///
/// Falls back to stderr if the file cannot be created.
pub fn init_file_logging(path: Option<&Path>, verbose: bool) {
    let log_path = path.map(Path::to_path_buf).unwrap_or_else(get_log_path);

    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging(verbose);
            return;
        }
    }

    // Appends across runs; every ask is one line of audit trail.
    let log_file = match File::options().create(true).append(true).open(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {}: {e}", log_path.display());
            init_stderr_logging(verbose);
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(default_filter(verbose))
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}

/// Returns the default log file path.
///
/// `~/.local/state/hotel-nlsql/hotel-nlsql.log` on Linux, the config
/// directory elsewhere, the temp directory as a last resort.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("hotel-nlsql").join("hotel-nlsql.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("hotel-nlsql").join("hotel-nlsql.log");
    }

    std::env::temp_dir().join("hotel-nlsql.log")
}
