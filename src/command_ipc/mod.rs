//! Local command channel between the CLI and the running daemon.
//!
//! This module provides:
//! - `command`: the command vocabulary
//! - `endpoint`: transport selection (unix socket or loopback TCP)
//! - `server`: daemon-side listener
//! - `client`: CLI-side sender

mod client;
mod command;
mod endpoint;
mod server;

pub use client::send_command;
pub use command::{Command, ThemeMode};
pub use endpoint::Endpoint;
pub use server::CommandServer;
