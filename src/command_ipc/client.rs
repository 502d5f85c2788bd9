//! CLI side of the command socket.

#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};

use super::{Command, Endpoint};
use crate::error::{Error, Result};

/// Deliver one command to a running daemon.
pub async fn send_command(endpoint: &Endpoint, command: Command) -> Result<()> {
    let unreachable_err = |source| Error::DaemonUnreachable {
        endpoint: endpoint.to_string(),
        source,
    };

    match endpoint {
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let stream = UnixStream::connect(path).await.map_err(unreachable_err)?;
            write_token(stream, command).await
        }
        Endpoint::Tcp(addr) => {
            let stream = TcpStream::connect(addr).await.map_err(unreachable_err)?;
            write_token(stream, command).await
        }
    }
}

async fn write_token<S: AsyncWrite + Unpin>(mut stream: S, command: Command) -> Result<()> {
    stream
        .write_all(format!("{}\n", command.token()).as_bytes())
        .await?;
    stream.shutdown().await?;
    Ok(())
}
