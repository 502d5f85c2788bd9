//! Installs, removes and tweaks the Pywalfox stylesheets in a profile's
//! `chrome` directory.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

const FONT_SIZE_PROPERTY: &str = "--pywalfox-font-size:";

/// Result of a stylesheet edit, reported to the extension verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssOutcome {
    pub success: bool,
    pub message: String,
}

impl CssOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub trait StylesheetEditor: Send + Sync {
    fn enable(&self, chrome_dir: &Path, target: &str) -> CssOutcome;
    fn disable(&self, chrome_dir: &Path, target: &str) -> CssOutcome;
    fn set_font_size(&self, chrome_dir: &Path, target: &str, size: u32) -> CssOutcome;
}

/// Copies bundled stylesheets into the profile.
pub struct ChromeStylesheets {
    assets: PathBuf,
}

impl ChromeStylesheets {
    pub fn new(assets: impl Into<PathBuf>) -> Self {
        Self {
            assets: assets.into(),
        }
    }
}

/// The extension names stylesheets by file name. Anything that could escape
/// the directory is refused.
fn is_plain_file_name(target: &str) -> bool {
    !target.is_empty()
        && target != "."
        && target != ".."
        && !target.contains(['/', '\\'])
}

fn invalid_target(target: &str) -> CssOutcome {
    CssOutcome::failed(format!("'{target}' is not a valid stylesheet name"))
}

impl StylesheetEditor for ChromeStylesheets {
    fn enable(&self, chrome_dir: &Path, target: &str) -> CssOutcome {
        if !is_plain_file_name(target) {
            return invalid_target(target);
        }
        let source = self.assets.join(target);
        if !source.is_file() {
            return CssOutcome::failed(format!(
                "Could not find the stylesheet '{target}' in {}",
                self.assets.display()
            ));
        }

        let copy = fs::create_dir_all(chrome_dir)
            .and_then(|()| fs::copy(&source, chrome_dir.join(target)));
        match copy {
            Ok(_) => {
                tracing::info!("Enabled {target} in {}", chrome_dir.display());
                CssOutcome::ok(format!("Custom CSS: '{target}' has been enabled"))
            }
            Err(e) => {
                tracing::error!("Failed to enable {target}: {e}");
                CssOutcome::failed(format!("Could not enable '{target}': {e}"))
            }
        }
    }

    fn disable(&self, chrome_dir: &Path, target: &str) -> CssOutcome {
        if !is_plain_file_name(target) {
            return invalid_target(target);
        }
        match fs::remove_file(chrome_dir.join(target)) {
            Ok(()) => {
                tracing::info!("Disabled {target} in {}", chrome_dir.display());
                CssOutcome::ok(format!("Custom CSS: '{target}' has been disabled"))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                CssOutcome::failed(format!("Custom CSS: '{target}' is not enabled"))
            }
            Err(e) => {
                tracing::error!("Failed to disable {target}: {e}");
                CssOutcome::failed(format!("Could not disable '{target}': {e}"))
            }
        }
    }

    fn set_font_size(&self, chrome_dir: &Path, target: &str, size: u32) -> CssOutcome {
        if !is_plain_file_name(target) {
            return invalid_target(target);
        }
        let path = chrome_dir.join(target);
        let css = match fs::read_to_string(&path) {
            Ok(css) => css,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return CssOutcome::failed(format!(
                    "Custom CSS: '{target}' must be enabled before changing the font size"
                ));
            }
            Err(e) => return CssOutcome::failed(format!("Could not read '{target}': {e}")),
        };

        let Some(updated) = replace_font_size(&css, size) else {
            return CssOutcome::failed(format!("'{target}' does not declare a font size"));
        };
        match fs::write(&path, updated) {
            Ok(()) => CssOutcome::ok(format!("Font size of '{target}' set to {size}px")),
            Err(e) => {
                tracing::error!("Failed to write {}: {e}", path.display());
                CssOutcome::failed(format!("Could not update '{target}': {e}"))
            }
        }
    }
}

/// Rewrite every `--pywalfox-font-size` declaration, keeping indentation.
fn replace_font_size(css: &str, size: u32) -> Option<String> {
    let mut found = false;
    let mut out = String::with_capacity(css.len());
    for line in css.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        let ending = &line[body.len()..];
        match body.find(FONT_SIZE_PROPERTY) {
            Some(start) => {
                found = true;
                out.push_str(&body[..start]);
                out.push_str(&format!("{FONT_SIZE_PROPERTY} {size}px;"));
                out.push_str(ending);
            }
            None => out.push_str(line),
        }
    }
    found.then_some(out)
}
