use std::{error::Error as StdError, fmt, io, result::Result as StdResult};

/// Failures of the length-prefixed upstream framing.
///
/// Any of these leaves the stream position unknown, so the daemon treats them
/// like a disconnect of the browser.
#[derive(Debug)]
pub enum FrameError {
    /// The stream closed in the middle of a frame.
    Truncated { expected: usize, received: usize },
    /// A frame length is outside what the channel accepts.
    Oversized { len: usize, max: usize },
    Io(io::Error),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { expected, received } => write!(
                f,
                "stream closed mid-frame ({received} of {expected} bytes received)"
            ),
            Self::Oversized { len, max } => {
                write!(f, "frame of {len} bytes exceeds the {max} byte limit")
            }
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for FrameError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Truncated { .. } | Self::Oversized { .. } => None,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Json(serde_json::Error),
    Watch(notify::Error),
    /// The command client could not reach a running daemon.
    DaemonUnreachable { endpoint: String, source: io::Error },
    Unsupported(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::Watch(e) => write!(f, "Watch error: {e}"),
            Self::DaemonUnreachable { endpoint, source } => {
                writeln!(f, "Could not connect to the daemon at {endpoint}: {source}")?;
                write!(
                    f,
                    "Make sure the browser is running and the Pywalfox extension is connected."
                )
            }
            Self::Unsupported(msg) => write!(f, "Unsupported: {msg}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) | Self::DaemonUnreachable { source: e, .. } => Some(e),
            Self::Json(e) => Some(e),
            Self::Watch(e) => Some(e),
            Self::Unsupported(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Self::Watch(e)
    }
}

pub type Result<T> = StdResult<T, Error>;
