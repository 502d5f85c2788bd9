//! Turns requests from the extension and commands from the CLI into replies
//! on the upstream channel.
//!
//! Every request from the extension gets exactly one reply. Commands from
//! the CLI produce a message for the extension and nothing for the CLI.

use std::{path::PathBuf, sync::Arc};

use serde_json::Value;

use crate::{
    command_ipc::{Command, ThemeMode},
    config::DAEMON_VERSION,
    error::FrameError,
    firefox::{CssOutcome, ProfileLocator, StylesheetEditor},
    native_ipc::{Action, Inbound, Message, Outbox, Request},
    pywal::{PaletteReply, PaletteSource},
};

pub const CHROME_NOT_FOUND: &str = "Could not find path to chrome folder";

/// Stylesheet change requested by the extension.
#[derive(Debug, Clone, Copy)]
enum CssEdit {
    Enable,
    Disable,
    FontSize(u32),
}

impl CssEdit {
    const fn action(self) -> Action {
        match self {
            Self::Enable => Action::CssEnable,
            Self::Disable => Action::CssDisable,
            Self::FontSize(_) => Action::CssFontSize,
        }
    }
}

pub struct Dispatcher {
    outbox: Outbox,
    /// Resolved once at startup.
    chrome_dir: Option<PathBuf>,
    palette: Arc<dyn PaletteSource>,
    stylesheets: Arc<dyn StylesheetEditor>,
}

impl Dispatcher {
    pub fn new(
        outbox: Outbox,
        profiles: &dyn ProfileLocator,
        palette: Arc<dyn PaletteSource>,
        stylesheets: Arc<dyn StylesheetEditor>,
    ) -> Self {
        let chrome_dir = profiles.chrome_dir();
        match &chrome_dir {
            Some(dir) => tracing::info!("Using chrome directory {}", dir.display()),
            None => tracing::warn!("{CHROME_NOT_FOUND}; stylesheet actions are unavailable"),
        }
        Self {
            outbox,
            chrome_dir,
            palette,
            stylesheets,
        }
    }

    async fn reply(&self, message: Message) -> Result<(), FrameError> {
        self.outbox.send(&message).await
    }

    async fn reply_invalid(&self, reason: String) -> Result<(), FrameError> {
        self.reply(Message::invalid(reason)).await
    }

    /// Route one decoded frame from the extension.
    pub async fn handle_upstream(&self, inbound: Inbound) -> Result<(), FrameError> {
        let request = match inbound {
            Inbound::Request(request) => request,
            Inbound::Malformed(reason) => {
                tracing::error!("Malformed request: {reason}");
                return self
                    .reply_invalid(format!("malformed request: {reason}"))
                    .await;
            }
        };

        let Some(action) = Action::from_wire(&request.action) else {
            tracing::debug!("{}: no such action", request.action);
            return self
                .reply_invalid(format!("{}: no such action", request.action))
                .await;
        };

        match action {
            Action::Version => self.send_version().await,
            Action::Colors => self.send_palette().await,
            Action::CssEnable => self.edit_css(&request, CssEdit::Enable).await,
            Action::CssDisable => self.edit_css(&request, CssEdit::Disable).await,
            Action::CssFontSize => match request.size {
                Some(size) => self.edit_css(&request, CssEdit::FontSize(size)).await,
                None => {
                    tracing::error!("{action}: size was not specified");
                    self.reply_invalid(format!("{action}: size was not specified"))
                        .await
                }
            },
            Action::ThemeMode | Action::Output | Action::InvalidAction => {
                tracing::debug!("{action}: not accepted from the extension");
                self.reply_invalid(format!("{action}: not accepted from the extension"))
                    .await
            }
        }
    }

    /// Route one command from the CLI.
    pub async fn handle_command(&self, command: Command) -> Result<(), FrameError> {
        match command {
            Command::Update => {
                tracing::debug!("CLI: Update pywal colors");
                self.send_palette().await
            }
            Command::Theme(mode) => {
                tracing::debug!("CLI: Set theme mode to {mode}");
                self.send_theme_mode(mode).await
            }
        }
    }

    pub async fn send_version(&self) -> Result<(), FrameError> {
        self.reply(Message::new(Action::Version).with_data(DAEMON_VERSION))
            .await
    }

    /// Fetch the current palette and push it to the extension.
    pub async fn send_palette(&self) -> Result<(), FrameError> {
        let source = self.palette.clone();
        let palette = tokio::task::spawn_blocking(move || source.fetch())
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Reading the palette failed: {e}");
                PaletteReply::failure(format!("Could not read the pywal colors: {e}"))
            });
        self.reply(
            Message::new(Action::Colors)
                .with_data(palette.data)
                .with_outcome(palette.success, palette.message),
        )
        .await
    }

    pub async fn send_theme_mode(&self, mode: ThemeMode) -> Result<(), FrameError> {
        self.reply(Message::new(Action::ThemeMode).with_data(mode.as_str()))
            .await
    }

    /// Text for the extension's debugging output.
    pub async fn send_output(&self, text: &str) -> Result<(), FrameError> {
        self.reply(Message::new(Action::Output).with_data(text)).await
    }

    async fn edit_css(&self, request: &Request, edit: CssEdit) -> Result<(), FrameError> {
        let action = edit.action();
        let Some(target) = request.target() else {
            tracing::error!("{action}: target was not specified");
            return self
                .reply_invalid(format!("{action}: target was not specified"))
                .await;
        };

        let Some(chrome_dir) = self.chrome_dir.as_deref() else {
            return self
                .reply(Message::new(action).with_data(target).failure(CHROME_NOT_FOUND))
                .await;
        };

        let stylesheets = self.stylesheets.clone();
        let (dir, file) = (chrome_dir.to_path_buf(), target.to_string());
        let outcome = tokio::task::spawn_blocking(move || match edit {
            CssEdit::Enable => stylesheets.enable(&dir, &file),
            CssEdit::Disable => stylesheets.disable(&dir, &file),
            CssEdit::FontSize(size) => stylesheets.set_font_size(&dir, &file, size),
        })
        .await
        .unwrap_or_else(|e| {
            tracing::error!("{action}: stylesheet edit failed: {e}");
            CssOutcome::failed(format!("Could not edit {target}: {e}"))
        });
        let data = match edit {
            CssEdit::FontSize(size) => Value::from(size),
            CssEdit::Enable | CssEdit::Disable => Value::from(target),
        };

        self.reply(
            Message::new(action)
                .with_data(data)
                .with_outcome(outcome.success, Some(outcome.message)),
        )
        .await
    }
}
