use std::fmt;

/// Theme mode the extension should switch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
    /// Follow the browser's own light/dark schedule.
    Auto,
}

impl ThemeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Out-of-band command delivered by the CLI over the local socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Re-read the pywal palette and push it to the extension.
    Update,
    Theme(ThemeMode),
}

impl Command {
    /// Token written on the socket.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Theme(ThemeMode::Dark) => "theme-dark",
            Self::Theme(ThemeMode::Light) => "theme-light",
            Self::Theme(ThemeMode::Auto) => "theme-auto",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "update" => Some(Self::Update),
            "theme-dark" => Some(Self::Theme(ThemeMode::Dark)),
            "theme-light" => Some(Self::Theme(ThemeMode::Light)),
            "theme-auto" => Some(Self::Theme(ThemeMode::Auto)),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
