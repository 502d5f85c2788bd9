//! Tracing setup for the daemon and the CLI.
//!
//! The daemon logs to `<cache>/pywalfox.log`. A log that has grown past
//! [`LOG_FILE_MAX_SIZE`] is moved to `pywalfox.log.1` at startup, replacing
//! the previous backup.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

use crate::config::{Config, LOG_FILE_MAX_SIZE};

fn env_filter(debug: bool) -> EnvFilter {
    let level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pywalfox_host={level}")))
}

/// Stdout belongs to the browser, so the daemon logs to a file.
pub fn init_file_logging(config: &Config, debug: bool) {
    let writer = match open_log_file(&config.log_file, LOG_FILE_MAX_SIZE) {
        Ok(file) => BoxMakeWriter::new(Mutex::new(file)),
        Err(e) => {
            eprintln!("Could not open {}: {e}", config.log_file.display());
            BoxMakeWriter::new(io::sink)
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .init();
}

pub fn init_stderr_logging(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Open `path` for appending, rotating it first if it exceeds `max_size`.
fn open_log_file(path: &Path, max_size: u64) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Err(e) = rotate(path, max_size) {
        eprintln!("Could not rotate {}: {e}", path.display());
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Move `path` to its `.1` backup when it is larger than `max_size`.
/// Returns whether a rotation happened.
fn rotate(path: &Path, max_size: u64) -> io::Result<bool> {
    let size = match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if size <= max_size {
        return Ok(false);
    }
    fs::rename(path, backup_path(path))?;
    Ok(true)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}
