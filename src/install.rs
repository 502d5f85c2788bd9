//! Registers the host with Firefox through a native messaging manifest.
//!
//! Firefox launches the path named in the manifest with the manifest path and
//! extension id as arguments, so the manifest points at a small launcher that
//! forwards them to `start`.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::{json, Value};

use crate::{
    config::{EXTENSION_ID, HOST_NAME},
    error::{Error, Result},
};

const LAUNCHER_NAME: &str = "pywalfox-host.sh";

#[derive(Debug, Clone)]
pub struct Installation {
    manifest_dir: PathBuf,
    launcher: PathBuf,
    executable: PathBuf,
}

impl Installation {
    /// Locations for the current user and the running executable.
    pub fn for_current_user() -> Result<Self> {
        let manifest_dir = native_messaging_hosts_dir()?;
        let data = dirs::data_dir()
            .ok_or_else(|| Error::Unsupported("no data directory for this user".to_string()))?;
        Ok(Self {
            manifest_dir,
            launcher: data.join("pywalfox").join(LAUNCHER_NAME),
            executable: std::env::current_exe()?,
        })
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_dir.join(format!("{HOST_NAME}.json"))
    }

    fn manifest(&self) -> Value {
        json!({
            "name": HOST_NAME,
            "description": "Automatically theme your browser using the colors generated by pywal",
            "path": self.launcher,
            "type": "stdio",
            "allowed_extensions": [EXTENSION_ID],
        })
    }

    fn launcher_script(&self) -> String {
        format!(
            "#!/bin/sh\nexec {} start \"$@\"\n",
            shell_quote(&self.executable)
        )
    }

    /// Write the launcher and the manifest, replacing earlier versions.
    pub fn install(&self) -> Result<()> {
        write_file(&self.launcher, &self.launcher_script())?;
        make_executable(&self.launcher)?;
        tracing::info!("Wrote launcher {}", self.launcher.display());

        let manifest = serde_json::to_string_pretty(&self.manifest())?;
        write_file(&self.manifest_path(), &manifest)?;
        tracing::info!("Wrote manifest {}", self.manifest_path().display());
        Ok(())
    }

    /// Remove what `install` wrote. Returns `false` if nothing was installed.
    pub fn uninstall(&self) -> Result<bool> {
        let manifest = remove_if_present(&self.manifest_path())?;
        let launcher = remove_if_present(&self.launcher)?;
        Ok(manifest || launcher)
    }
}

fn write_file(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Single-quote for `sh`.
fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

fn native_messaging_hosts_dir() -> Result<PathBuf> {
    let home = || {
        dirs::home_dir()
            .ok_or_else(|| Error::Unsupported("no home directory for this user".to_string()))
    };
    if cfg!(target_os = "macos") {
        Ok(home()?.join("Library/Application Support/Mozilla/NativeMessagingHosts"))
    } else if cfg!(windows) {
        // Firefox on Windows finds hosts through the registry only.
        Err(Error::Unsupported(
            "registering the host on Windows requires a registry entry".to_string(),
        ))
    } else {
        Ok(home()?.join(".mozilla/native-messaging-hosts"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installation(root: &Path) -> Installation {
        Installation {
            manifest_dir: root.join("native-messaging-hosts"),
            launcher: root.join("data/pywalfox").join(LAUNCHER_NAME),
            executable: PathBuf::from("/opt/pywal fox/pywalfox-host"),
        }
    }

    #[test]
    fn manifest_names_launcher_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let install = installation(dir.path());

        let manifest = install.manifest();
        assert_eq!(manifest["name"], "pywalfox");
        assert_eq!(manifest["type"], "stdio");
        assert_eq!(manifest["allowed_extensions"], json!(["pywalfox@frewacom.org"]));
        assert_eq!(
            manifest["path"].as_str().unwrap(),
            install.launcher.to_str().unwrap()
        );
    }

    #[test]
    fn launcher_quotes_executable() {
        let install = installation(Path::new("/unused"));
        assert_eq!(
            install.launcher_script(),
            "#!/bin/sh\nexec '/opt/pywal fox/pywalfox-host' start \"$@\"\n"
        );
        assert_eq!(shell_quote(Path::new("/a'b")), r"'/a'\''b'");
    }

    #[test]
    fn install_then_uninstall() {
        let dir = tempfile::tempdir().unwrap();
        let install = installation(dir.path());

        install.install().unwrap();
        let written: Value =
            serde_json::from_str(&fs::read_to_string(install.manifest_path()).unwrap()).unwrap();
        assert_eq!(written, install.manifest());
        assert!(install.launcher.is_file());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&install.launcher).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        assert!(install.uninstall().unwrap());
        assert!(!install.manifest_path().exists());
        assert!(!install.launcher.exists());
        assert!(!install.uninstall().unwrap());
    }
}
