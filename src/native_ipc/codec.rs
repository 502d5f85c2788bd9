//! Length-prefixed framing used by browser native messaging.
//!
//! ```text
//! +----------------+---------------------------+
//! | len: u32 (ne)  | len bytes of UTF-8 JSON   |
//! +----------------+---------------------------+
//! ```
//!
//! The prefix is in the host's native byte order, the same convention the
//! browser uses on its side of the pipe.
//!
//! An inbound frame over the size limit is skipped rather than buffered. The
//! prefix still says where the next frame starts, so the stream stays usable.

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FrameError;

const PREFIX_LEN: usize = 4;

/// Largest message the browser accepts from a native host.
pub const MAX_OUTBOUND_LEN: usize = 1024 * 1024;

/// Sanity bound for frames coming from the browser.
pub const MAX_INBOUND_LEN: usize = 64 * 1024 * 1024;

/// One decoded inbound frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// Body of the frame, prefix stripped.
    Body(BytesMut),
    /// A frame over the inbound limit whose `len` body bytes were dropped.
    Skipped { len: usize, max: usize },
}

#[cfg(test)]
impl Frame {
    pub fn into_body(self) -> BytesMut {
        match self {
            Self::Body(body) => body,
            Self::Skipped { len, .. } => panic!("expected a frame body, frame of {len} bytes was skipped"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_inbound: usize,
    max_outbound: usize,
    /// Body bytes of an oversized frame still to drop.
    discard: usize,
    /// Declared length of the frame being dropped.
    skipped_len: usize,
}

impl FrameCodec {
    pub const fn new() -> Self {
        Self {
            max_inbound: MAX_INBOUND_LEN,
            max_outbound: MAX_OUTBOUND_LEN,
            discard: 0,
            skipped_len: 0,
        }
    }

    #[cfg(test)]
    pub const fn with_max_inbound(max_inbound: usize) -> Self {
        Self {
            max_inbound,
            ..Self::new()
        }
    }

    /// Drop buffered bytes of the frame being skipped. Yields the marker once
    /// the whole body is gone.
    fn discard_from(&mut self, src: &mut BytesMut) -> Option<Frame> {
        let n = self.discard.min(src.len());
        src.advance(n);
        self.discard -= n;
        if self.discard > 0 {
            return None;
        }
        tracing::warn!(
            "Skipped inbound frame of {} bytes (limit {})",
            self.skipped_len,
            self.max_inbound
        );
        Some(Frame::Skipped {
            len: self.skipped_len,
            max: self.max_inbound,
        })
    }

    fn declared_len(src: &[u8]) -> usize {
        let mut prefix = [0u8; PREFIX_LEN];
        prefix.copy_from_slice(&src[..PREFIX_LEN]);
        u32::from_ne_bytes(prefix) as usize
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.discard > 0 {
            return Ok(self.discard_from(src));
        }

        if src.len() < PREFIX_LEN {
            src.reserve(PREFIX_LEN - src.len());
            return Ok(None);
        }

        let len = Self::declared_len(src);
        if len > self.max_inbound {
            src.advance(PREFIX_LEN);
            self.discard = len;
            self.skipped_len = len;
            return Ok(self.discard_from(src));
        }

        let total = PREFIX_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(PREFIX_LEN);
        Ok(Some(Frame::Body(src.split_to(len))))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if self.discard > 0 {
            return Err(FrameError::Truncated {
                expected: PREFIX_LEN + self.skipped_len,
                received: PREFIX_LEN + self.skipped_len - self.discard,
            });
        }
        if buf.is_empty() {
            return Ok(None);
        }

        let expected = if buf.len() < PREFIX_LEN {
            PREFIX_LEN
        } else {
            PREFIX_LEN + Self::declared_len(buf)
        };
        Err(FrameError::Truncated {
            expected,
            received: buf.len(),
        })
    }
}

impl<T: Serialize> Encoder<T> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item).map_err(io::Error::from)?;
        let oversized = FrameError::Oversized {
            len: body.len(),
            max: self.max_outbound,
        };
        if body.len() > self.max_outbound {
            return Err(oversized);
        }
        let len = u32::try_from(body.len()).map_err(|_| oversized)?;

        dst.reserve(PREFIX_LEN + body.len());
        dst.put_u32_ne(len);
        dst.extend_from_slice(&body);
        Ok(())
    }
}
