use std::{
    env, fmt,
    net::{Ipv4Addr, SocketAddr},
};
#[cfg(unix)]
use std::path::PathBuf;

/// Address of the local command server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Filesystem socket, the default on unix.
    #[cfg(unix)]
    Unix(PathBuf),
    /// Loopback TCP, used where unix sockets are unavailable.
    Tcp(SocketAddr),
}

impl Endpoint {
    pub fn platform_default() -> Self {
        #[cfg(unix)]
        {
            Self::Unix(PathBuf::from(crate::config::UNIX_SOCKET_PATH))
        }
        #[cfg(not(unix))]
        {
            Self::loopback(crate::config::TCP_SOCKET_PORT)
        }
    }

    #[cfg_attr(unix, allow(dead_code))]
    pub fn loopback(port: u16) -> Self {
        Self::Tcp(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }

    /// `PYWALFOX_SOCKET` may hold a socket address (`127.0.0.1:56744`) or,
    /// on unix, a socket path.
    pub fn from_env() -> Self {
        match env::var("PYWALFOX_SOCKET") {
            Ok(value) if !value.is_empty() => Self::parse(&value),
            _ => Self::platform_default(),
        }
    }

    fn parse(value: &str) -> Self {
        if let Ok(addr) = value.parse::<SocketAddr>() {
            return Self::Tcp(addr);
        }
        #[cfg(unix)]
        {
            Self::Unix(PathBuf::from(value))
        }
        #[cfg(not(unix))]
        {
            tracing::warn!("Ignoring PYWALFOX_SOCKET={value}: not a socket address");
            Self::platform_default()
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}
