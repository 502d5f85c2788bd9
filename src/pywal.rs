//! Reads the palette pywal generated for the current wallpaper.

use std::{fs, io, path::PathBuf};

use serde_json::{json, Value};

/// Pywal always writes sixteen terminal colors.
const PALETTE_SIZE: usize = 16;

/// Result of fetching the palette, passed to the extension as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteReply {
    pub success: bool,
    pub data: Option<Value>,
    pub message: Option<String>,
}

impl PaletteReply {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

pub trait PaletteSource: Send + Sync {
    fn fetch(&self) -> PaletteReply;
}

/// Palette read from pywal's cache directory.
pub struct PywalPalette {
    wal_dir: PathBuf,
}

impl PywalPalette {
    pub fn new(wal_dir: impl Into<PathBuf>) -> Self {
        Self {
            wal_dir: wal_dir.into(),
        }
    }

    fn read_colors(&self) -> io::Result<String> {
        fs::read_to_string(self.wal_dir.join("colors"))
    }

    /// Path of the current wallpaper, if pywal recorded one.
    fn read_wallpaper(&self) -> Option<String> {
        let raw = fs::read_to_string(self.wal_dir.join("wal")).ok()?;
        let wallpaper = raw.trim();
        (!wallpaper.is_empty()).then(|| wallpaper.to_string())
    }
}

impl PaletteSource for PywalPalette {
    fn fetch(&self) -> PaletteReply {
        let raw = match self.read_colors() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Could not read pywal colors from {}: {e}", self.wal_dir.display());
                return PaletteReply::failure(format!(
                    "Could not read colors from {}. Run pywal to generate a colorscheme first.",
                    self.wal_dir.join("colors").display()
                ));
            }
        };

        match parse_colors(&raw) {
            Ok(colors) => PaletteReply {
                success: true,
                data: Some(json!({
                    "colors": colors,
                    "wallpaper": self.read_wallpaper(),
                })),
                message: None,
            },
            Err(message) => {
                tracing::error!("Invalid pywal colors: {message}");
                PaletteReply::failure(message)
            }
        }
    }
}

/// Parse the `colors` file: one `#rrggbb` color per line.
fn parse_colors(raw: &str) -> Result<Vec<String>, String> {
    let colors: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if colors.len() < PALETTE_SIZE {
        return Err(format!(
            "Expected {PALETTE_SIZE} pywal colors, found {}",
            colors.len()
        ));
    }

    colors
        .into_iter()
        .take(PALETTE_SIZE)
        .map(|color| {
            if is_hex_color(color) {
                Ok(color.to_string())
            } else {
                Err(format!("Invalid color in pywal output: {color:?}"))
            }
        })
        .collect()
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}
