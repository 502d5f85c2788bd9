#![allow(dead_code)]

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use serde_json::Value;
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_pywalfox-host");
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A host process started the way the browser starts it, with every path it
/// touches redirected into a temporary directory.
pub struct HostTestHarness {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames: Receiver<Value>,
    dir: TempDir,
}

impl HostTestHarness {
    pub fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("cache/wal")).unwrap();
        Self::spawn_in(dir)
    }

    /// Like `spawn`, with a sixteen color pywal palette already in place.
    pub fn spawn_with_palette() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let wal = dir.path().join("cache/wal");
        std::fs::create_dir_all(&wal).unwrap();
        let colors: String = (0..16).map(|i| format!("#{i:02x}{i:02x}{i:02x}\n")).collect();
        std::fs::write(wal.join("colors"), colors).unwrap();
        Self::spawn_in(dir)
    }

    fn spawn_in(dir: TempDir) -> Self {
        let mut child = configure(Command::new(BIN), dir.path())
            .args(["start", "/path/to/pywalfox.json", "pywalfox@frewacom.org"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn pywalfox-host");

        let stdin = child.stdin.take();
        let mut stdout = child.stdout.take().expect("stdout piped");

        let (tx, frames) = mpsc::channel();
        std::thread::spawn(move || {
            while let Some(frame) = read_frame(&mut stdout) {
                if tx.send(frame).is_err() {
                    break;
                }
            }
        });

        Self {
            child: Some(child),
            stdin,
            frames,
            dir,
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        socket_path(self.dir.path())
    }

    pub fn send(&mut self, content: &str) -> std::io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed"))?;
        let len = u32::try_from(content.len()).expect("frame fits in u32");
        stdin.write_all(&len.to_ne_bytes())?;
        stdin.write_all(content.as_bytes())?;
        stdin.flush()
    }

    pub fn read_message(&mut self) -> Option<Value> {
        self.frames.recv_timeout(TIMEOUT).ok()
    }

    /// Ask for the version and wait for the answer, which also means the
    /// command socket is up.
    pub fn handshake(&mut self) -> Value {
        self.send(r#"{"action":"debug:version"}"#)
            .expect("Failed to send version request");
        self.read_message().expect("Failed to get version response")
    }

    /// Run a CLI subcommand against this host.
    pub fn cli(&self, args: &[&str]) -> Output {
        run_cli(self.dir.path(), args)
    }

    /// Close stdin and wait for the process to exit.
    pub fn close(&mut self) -> Option<std::process::ExitStatus> {
        self.stdin.take();
        let child = self.child.as_mut()?;
        let deadline = Instant::now() + TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(status)) = child.try_wait() {
                return Some(status);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        None
    }
}

impl Drop for HostTestHarness {
    fn drop(&mut self) {
        if let Some(ref mut child) = self.child {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Run a CLI subcommand with paths redirected into `root`.
pub fn run_cli(root: &Path, args: &[&str]) -> Output {
    configure(Command::new(BIN), root)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("Failed to run pywalfox-host")
}

fn socket_path(root: &Path) -> PathBuf {
    root.join("pywalfox.sock")
}

fn configure(mut command: Command, root: &Path) -> Command {
    command
        .env("PYWALFOX_SOCKET", socket_path(root))
        .env("XDG_CACHE_HOME", root.join("cache"))
        .env("PYWALFOX_CSS_DIR", root.join("css"))
        .env("HOME", root)
        .env_remove("RUST_LOG");
    command
}

fn read_frame(stdout: &mut impl Read) -> Option<Value> {
    let mut prefix = [0u8; 4];
    stdout.read_exact(&mut prefix).ok()?;
    let len = u32::from_ne_bytes(prefix) as usize;
    let mut body = vec![0u8; len];
    stdout.read_exact(&mut body).ok()?;
    serde_json::from_slice(&body).ok()
}
