//! Firefox profile integration: profile discovery and custom stylesheets.

mod css;
mod profile;

pub use css::{ChromeStylesheets, CssOutcome, StylesheetEditor};
pub use profile::{FirefoxProfiles, ProfileLocator};
