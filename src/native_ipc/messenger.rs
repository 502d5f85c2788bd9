//! The two halves of the upstream channel.
//!
//! `Inbox` is owned by the main loop. `Outbox` is cloned into every task
//! that needs to reach the extension; its lock is the only thing that orders
//! writes to the channel.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::Mutex,
};
use tokio_util::codec::{FramedRead, FramedWrite};

use super::{Frame, FrameCodec, Inbound, Message};
use crate::error::FrameError;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Split the upstream channel into its receiving and sending halves.
pub fn channel<R, W>(reader: R, writer: W) -> (Inbox<R>, Outbox)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    (Inbox::new(reader), Outbox::new(writer))
}

/// Receiving half: frames from the extension.
pub struct Inbox<R> {
    frames: FramedRead<R, FrameCodec>,
}

impl<R: AsyncRead + Unpin> Inbox<R> {
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, FrameCodec::new())
    }

    fn with_codec(reader: R, codec: FrameCodec) -> Self {
        Self {
            frames: FramedRead::new(reader, codec),
        }
    }

    /// Wait for the next frame.
    ///
    /// `Ok(None)` means the extension closed the channel. Errors leave the
    /// stream unusable and should be handled as a disconnect as well. A frame
    /// over the size limit comes back as `Inbound::Malformed`.
    pub async fn receive(&mut self) -> Result<Option<Inbound>, FrameError> {
        match self.frames.next().await {
            Some(Ok(Frame::Body(body))) => Ok(Some(Inbound::parse(&body))),
            Some(Ok(Frame::Skipped { len, max })) => Ok(Some(Inbound::Malformed(
                FrameError::Oversized { len, max }.to_string(),
            ))),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Sending half: frames to the extension. Cheap to clone.
#[derive(Clone)]
pub struct Outbox {
    sink: Arc<Mutex<FramedWrite<BoxedWriter, FrameCodec>>>,
}

impl Outbox {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: BoxedWriter = Box::new(writer);
        Self {
            sink: Arc::new(Mutex::new(FramedWrite::new(writer, FrameCodec::new()))),
        }
    }

    /// Encode, write and flush one frame while holding the send lock.
    pub async fn send(&self, message: &Message) -> Result<(), FrameError> {
        tracing::debug!(action = %message.action, success = message.success, "Sending message");
        let mut sink = self.sink.lock().await;
        sink.send(message).await
    }
}
