//! Native messaging channel between the host and the browser extension.
//!
//! This module provides:
//! - `protocol`: message and request types exchanged with the extension
//! - `codec`: the length-prefixed frame codec
//! - `messenger`: the receive and send halves over stdin/stdout

mod codec;
mod messenger;
mod protocol;

pub use codec::{Frame, FrameCodec};
pub use messenger::{channel, Inbox, Outbox};
pub use protocol::{Action, Inbound, Message, Request};
