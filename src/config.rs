//! Constants and filesystem locations used by the host.
//!
//! Everything is derived from the environment at startup; there is no
//! configuration file.

use std::{env, path::PathBuf, time::Duration};

use crate::command_ipc::Endpoint;

/// Version reported to the extension. The extension refuses to talk to
/// hosts older than the version it was built against.
pub const DAEMON_VERSION: &str = "2.7";

/// Name of the native messaging host, as registered in the manifest.
pub const HOST_NAME: &str = "pywalfox";

pub const EXTENSION_ID: &str = "pywalfox@frewacom.org";

#[cfg_attr(not(unix), allow(dead_code))]
pub const UNIX_SOCKET_PATH: &str = "/tmp/pywalfox_socket";
#[cfg_attr(unix, allow(dead_code))]
pub const TCP_SOCKET_PORT: u16 = 56744;

/// The daemon log is rotated at startup once it grows past this many bytes.
pub const LOG_FILE_MAX_SIZE: u64 = 200_000;

const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_millis(100);

/// Resolved runtime locations.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the local command server listens and the CLI connects.
    pub endpoint: Endpoint,
    /// Pywal output directory (`colors`, `wal`).
    pub wal_dir: PathBuf,
    pub log_file: PathBuf,
    /// Root of the Firefox profiles (the directory holding `profiles.ini`).
    pub profiles_dir: Option<PathBuf>,
    /// Stylesheets shipped with the host that get copied into the profile.
    pub css_dir: PathBuf,
    /// Change events closer together than this collapse into one refresh.
    pub watch_debounce: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let cache = cache_dir();
        Self {
            endpoint: Endpoint::from_env(),
            wal_dir: cache.join("wal"),
            log_file: cache.join("pywalfox.log"),
            profiles_dir: firefox_profiles_dir(),
            css_dir: css_dir(),
            watch_debounce: DEFAULT_WATCH_DEBOUNCE,
        }
    }

    /// The file pywal rewrites on every theme change.
    pub fn colors_file(&self) -> PathBuf {
        self.wal_dir.join("colors")
    }
}

/// Pywal writes to `$XDG_CACHE_HOME/wal` on every platform, falling back to
/// `~/.cache` rather than the platform cache directory.
fn cache_dir() -> PathBuf {
    env::var_os("XDG_CACHE_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from(".cache"))
}

fn css_dir() -> PathBuf {
    env::var_os("PYWALFOX_CSS_DIR")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pywalfox/css")
        })
}

fn firefox_profiles_dir() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join("Library/Application Support/Firefox"))
    } else if cfg!(windows) {
        dirs::config_dir().map(|roaming| roaming.join("Mozilla/Firefox"))
    } else {
        dirs::home_dir().map(|home| home.join(".mozilla/firefox"))
    }
}
