//! Change notifications for the pywal palette file.
//!
//! The watch is placed on the file's parent directory so that it survives
//! the file being replaced, and events are filtered down to the one file.
//! The `notify` callback runs on the backend's own thread and only pushes
//! into a channel; consumers read from that channel on the runtime.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// The watched file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchEvent;

pub struct ChangeWatcher {
    path: PathBuf,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl ChangeWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            watcher: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn slot(&self) -> MutexGuard<'_, Option<RecommendedWatcher>> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to changes. Restarting replaces the previous subscription.
    pub fn start(&self) -> Result<mpsc::UnboundedReceiver<WatchEvent>> {
        let file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| Error::Unsupported(format!("cannot watch {}", self.path.display())))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if touches(&event, &file_name) => {
                let _ = event_tx.send(WatchEvent);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Watch error: {e}"),
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        *self.slot() = Some(watcher);
        tracing::info!("Watching {}", self.path.display());
        Ok(event_rx)
    }

    /// Drop the subscription, which also closes the event channel.
    ///
    /// Returns `false` if nothing was being watched.
    pub fn stop(&self) -> bool {
        let stopped = self.slot().take().is_some();
        if stopped {
            tracing::debug!("Stopped watching {}", self.path.display());
        }
        stopped
    }
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

/// Wait for the next change, then swallow follow-up events until the file
/// has been quiet for `window`. A zero window disables the coalescing.
pub async fn recv_debounced(
    events: &mut mpsc::UnboundedReceiver<WatchEvent>,
    window: Duration,
) -> Option<WatchEvent> {
    let event = events.recv().await?;
    if window.is_zero() {
        return Some(event);
    }
    while let Ok(Some(_)) = tokio::time::timeout(window, events.recv()).await {}
    Some(event)
}
