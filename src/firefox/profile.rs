//! Locates the `chrome` directory of the default Firefox profile.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

pub trait ProfileLocator: Send + Sync {
    /// `chrome` directory of the profile to customize, if one was found.
    fn chrome_dir(&self) -> Option<PathBuf>;
}

/// Reads `profiles.ini` under the Firefox profiles root.
pub struct FirefoxProfiles {
    root: Option<PathBuf>,
}

impl FirefoxProfiles {
    pub const fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

impl ProfileLocator for FirefoxProfiles {
    fn chrome_dir(&self) -> Option<PathBuf> {
        let root = self.root.as_deref()?;
        let ini = match fs::read_to_string(root.join("profiles.ini")) {
            Ok(ini) => ini,
            Err(e) => {
                tracing::warn!("Could not read profiles.ini in {}: {e}", root.display());
                return None;
            }
        };

        let profile = default_profile(root, &parse_ini(&ini))?;
        if !profile.is_dir() {
            tracing::warn!("Default profile {} does not exist", profile.display());
            return None;
        }
        Some(profile.join("chrome"))
    }
}

struct Section {
    name: String,
    entries: HashMap<String, String>,
}

impl Section {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

fn parse_ini(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            sections.push(Section {
                name: name.to_string(),
                entries: HashMap::new(),
            });
        } else if let (Some(section), Some((key, value))) = (sections.last_mut(), line.split_once('=')) {
            section
                .entries
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    sections
}

/// Pick the profile Firefox starts with.
///
/// Newer releases record the default per installation in `[Install…]`
/// sections; older ones flag a `[Profile…]` section with `Default=1`.
fn default_profile(root: &Path, sections: &[Section]) -> Option<PathBuf> {
    let installed = sections
        .iter()
        .filter(|section| section.name.starts_with("Install"))
        .find_map(|section| section.get("Default"))
        .map(|path| root.join(path));
    if installed.is_some() {
        return installed;
    }

    let mut profiles = sections
        .iter()
        .filter(|section| section.name.starts_with("Profile"));
    let profile = profiles
        .clone()
        .find(|section| section.get("Default") == Some("1"))
        .or_else(|| profiles.next())?;

    let path = profile.get("Path")?;
    if profile.get("IsRelative") == Some("0") {
        Some(PathBuf::from(path))
    } else {
        Some(root.join(path))
    }
}
