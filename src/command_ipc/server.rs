//! Local socket server that receives commands from the CLI.
//!
//! Each connection carries one command token and is closed afterwards.
//! Nothing is ever written back to the client.

use std::{
    io,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
#[cfg(unix)]
use std::{fs, path::Path};

#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    net::TcpListener,
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use super::{Command, Endpoint};

/// Longest command line read from a client.
const MAX_COMMAND_LEN: u64 = 1024;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

type BoxedStream = Box<dyn AsyncRead + Send + Unpin>;

/// Listener for one of the supported transports.
enum Listener {
    #[cfg(unix)]
    Unix(UnixListener),
    Tcp(TcpListener),
}

impl Listener {
    async fn bind(endpoint: &Endpoint) -> io::Result<Self> {
        match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => bind_unix(path).await.map(Self::Unix),
            Endpoint::Tcp(addr) => TcpListener::bind(addr).await.map(Self::Tcp),
        }
    }

    async fn accept(&self) -> io::Result<BoxedStream> {
        match self {
            #[cfg(unix)]
            Self::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(Box::new(stream))
            }
            Self::Tcp(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(Box::new(stream))
            }
        }
    }
}

/// Bind a unix socket, replacing a stale socket file left by a daemon that
/// did not shut down cleanly. A socket with a live listener is left alone.
#[cfg(unix)]
async fn bind_unix(path: &Path) -> io::Result<UnixListener> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    match UnixListener::bind(path) {
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            if UnixStream::connect(path).await.is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    "another daemon is already listening",
                ));
            }
            tracing::info!("Removing stale socket {}", path.display());
            fs::remove_file(path)?;
            UnixListener::bind(path)
        }
        result => result,
    }
}

/// Local command server. Owns its listener for the whole accept loop.
pub struct CommandServer {
    endpoint: Endpoint,
    cancel: CancellationToken,
    bound: AtomicBool,
    closed: AtomicBool,
}

impl CommandServer {
    /// The server stops when `shutdown` is cancelled or `close` is called.
    pub fn new(endpoint: Endpoint, shutdown: &CancellationToken) -> Self {
        Self {
            endpoint,
            cancel: shutdown.child_token(),
            bound: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Bind the endpoint and spawn the accept loop.
    ///
    /// Returns the stream of received commands, or `None` when the endpoint
    /// is in use or cannot be created. The daemon keeps running without CLI
    /// support in that case.
    pub async fn start(&self) -> Option<mpsc::Receiver<Command>> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }

        let listener = match Listener::bind(&self.endpoint).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::warn!("Failed to bind command socket at {}: {e}", self.endpoint);
                return None;
            }
        };
        self.bound.store(true, Ordering::SeqCst);
        tracing::info!("Listening for commands on {}", self.endpoint);

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(16);
        tokio::spawn(accept_loop(listener, cmd_tx, self.cancel.clone()));
        Some(cmd_rx)
    }

    /// Stop accepting and remove the socket file.
    ///
    /// Returns `false` if the server was already closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.cancel.cancel();

        #[cfg(unix)]
        if self.bound.load(Ordering::SeqCst) {
            if let Endpoint::Unix(path) = &self.endpoint {
                if let Err(e) = fs::remove_file(path) {
                    tracing::warn!("Failed to remove socket {}: {e}", path.display());
                }
            }
        }

        tracing::debug!("Command server closed");
        true
    }
}

async fn accept_loop(listener: Listener, cmd_tx: mpsc::Sender<Command>, cancel: CancellationToken) {
    loop {
        let accepted = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok(stream) => {
                tokio::spawn(handle_client(stream, cmd_tx.clone(), cancel.clone()));
            }
            Err(e) => {
                tracing::error!("Accept error: {e}");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
    tracing::debug!("Accept loop finished");
}

/// Handle a single CLI connection. Abandoned when the server closes, so an
/// idle client cannot hold the command stream open.
async fn handle_client(
    stream: BoxedStream,
    cmd_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
) {
    let read = tokio::select! {
        () = cancel.cancelled() => {
            tracing::debug!("Dropping pending client connection");
            return;
        }
        read = read_line(stream) => read,
    };
    let line = match read {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!("Failed to read command: {e}");
            return;
        }
    };

    let Some(command) = Command::parse(&line) else {
        tracing::debug!("Ignoring unknown command {:?}", line.trim());
        return;
    };

    tracing::debug!("CLI: {command}");
    if cmd_tx.send(command).await.is_err() {
        tracing::debug!("Command consumer has stopped, dropping {command}");
    }
}

/// Read up to the first newline or the end of the stream.
async fn read_line(stream: BoxedStream) -> io::Result<String> {
    let mut line = String::new();
    BufReader::new(stream.take(MAX_COMMAND_LEN))
        .read_line(&mut line)
        .await?;
    Ok(line)
}
