//! The native messaging daemon.
//!
//! Architecture:
//! ```text
//! extension ──stdin──→ Inbox ──┐
//! CLI ──socket──→ CommandServer ──→ Dispatcher ──→ Outbox ──stdout──→ extension
//! pywal colors ──→ ChangeWatcher ──┘
//! ```
//!
//! Each input runs in its own task. They all reply through the one `Outbox`.

mod dispatcher;
mod state;

use std::{sync::Arc, time::Duration};

use tokio::{io::AsyncRead, sync::mpsc};
use tokio_util::sync::CancellationToken;

pub use dispatcher::Dispatcher;
pub use state::DaemonState;
use state::StateCell;

use crate::{
    command_ipc::{Command, CommandServer},
    native_ipc::Inbox,
    watcher::{recv_debounced, ChangeWatcher, WatchEvent},
};

pub struct Daemon {
    dispatcher: Arc<Dispatcher>,
    server: Arc<CommandServer>,
    watcher: Arc<ChangeWatcher>,
    state: StateCell,
    shutdown: CancellationToken,
    watch_debounce: Duration,
}

impl Daemon {
    /// `shutdown` is the token the command server was built with; cancelling
    /// it from anywhere stops the daemon.
    pub fn new(
        dispatcher: Dispatcher,
        server: Arc<CommandServer>,
        watcher: Arc<ChangeWatcher>,
        shutdown: CancellationToken,
        watch_debounce: Duration,
    ) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            server,
            watcher,
            state: StateCell::new(),
            shutdown,
            watch_debounce,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state.get()
    }

    /// Ask a running daemon to shut down.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Serve until the extension disconnects or a stop is requested.
    pub async fn run<R: AsyncRead + Unpin>(&self, mut inbox: Inbox<R>) {
        if self.state() != DaemonState::Idle {
            tracing::warn!("Daemon is {}, not starting it again", self.state());
            return;
        }
        self.start_command_server().await;
        self.start_watcher();
        if self.state.advance(DaemonState::Running) {
            tracing::info!("Daemon running");
        }

        loop {
            let received = tokio::select! {
                () = self.shutdown.cancelled() => {
                    tracing::info!("Stop requested");
                    break;
                }
                received = inbox.receive() => received,
            };

            match received {
                Ok(Some(inbound)) => {
                    tracing::debug!("Received message from extension: {inbound:?}");
                    if let Err(e) = self.dispatcher.handle_upstream(inbound).await {
                        tracing::warn!("Could not reply to the extension: {e}");
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!("Extension disconnected");
                    break;
                }
                Err(e) => {
                    tracing::warn!("Upstream channel failed: {e}");
                    break;
                }
            }
        }

        self.close();
    }

    /// Stop every subsystem. Safe to call more than once.
    fn close(&self) {
        if !self.state.advance(DaemonState::ShuttingDown) {
            return;
        }
        tracing::debug!("Running cleanup");
        self.shutdown.cancel();
        self.watcher.stop();
        self.server.close();
        self.state.advance(DaemonState::Stopped);
        tracing::info!("Daemon stopped");
    }

    async fn start_command_server(&self) {
        let Some(commands) = self.server.start().await else {
            let text = format!(
                "Could not listen on {}; CLI commands are unavailable",
                self.server.endpoint()
            );
            if let Err(e) = self.dispatcher.send_output(&text).await {
                tracing::warn!("Could not report command socket failure: {e}");
            }
            return;
        };
        tokio::spawn(command_loop(
            commands,
            self.dispatcher.clone(),
            self.shutdown.clone(),
        ));
    }

    fn start_watcher(&self) {
        match self.watcher.start() {
            Ok(events) => {
                tokio::spawn(watch_loop(
                    events,
                    self.dispatcher.clone(),
                    self.watch_debounce,
                    self.shutdown.clone(),
                ));
            }
            Err(e) => tracing::warn!(
                "Could not watch {}: {e}; colors will only update on request",
                self.watcher.path().display()
            ),
        }
    }
}

async fn command_loop(
    mut commands: mpsc::Receiver<Command>,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            () = shutdown.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };
        if let Err(e) = dispatcher.handle_command(command).await {
            tracing::warn!("Could not deliver {command} to the extension: {e}");
        }
    }
}

async fn watch_loop(
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    dispatcher: Arc<Dispatcher>,
    debounce: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => break,
            event = recv_debounced(&mut events, debounce) => event,
        };
        if event.is_none() {
            break;
        }
        tracing::debug!("Pywal colors changed");
        if let Err(e) = dispatcher.send_palette().await {
            tracing::warn!("Could not push updated colors: {e}");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{fs, path::PathBuf};

    use bytes::BufMut;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt, DuplexStream},
        net::UnixStream,
        task::JoinHandle,
        time::timeout,
    };

    use super::{
        dispatcher::tests::{FixedPalette, FixedProfile, RecordingStylesheets, Replies},
        *,
    };
    use crate::{
        command_ipc::{send_command, Endpoint, ThemeMode},
        firefox::CssOutcome,
        native_ipc::{Action, Outbox},
    };

    const WAIT: Duration = Duration::from_secs(5);

    struct Running {
        daemon: Arc<Daemon>,
        task: JoinHandle<()>,
        upstream: DuplexStream,
        replies: Replies,
        server: Arc<CommandServer>,
        watcher: Arc<ChangeWatcher>,
        socket: PathBuf,
        colors: PathBuf,
        _dir: tempfile::TempDir,
    }

    async fn spawn_daemon() -> Running {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("pywalfox.sock");
        let colors = dir.path().join("colors");
        spawn_daemon_with(dir, socket, colors).await
    }

    async fn spawn_daemon_with(dir: tempfile::TempDir, socket: PathBuf, colors: PathBuf) -> Running {
        let (upstream, host_in) = tokio::io::duplex(64 * 1024);
        let (host_out, browser_in) = tokio::io::duplex(64 * 1024);

        let shutdown = CancellationToken::new();
        let server = Arc::new(CommandServer::new(Endpoint::Unix(socket.clone()), &shutdown));
        let watcher = Arc::new(ChangeWatcher::new(&colors));
        let dispatcher = Dispatcher::new(
            Outbox::new(host_out),
            &FixedProfile(Some(dir.path().join("chrome"))),
            Arc::new(FixedPalette),
            RecordingStylesheets::answering(CssOutcome::ok("done")),
        );
        let daemon = Arc::new(Daemon::new(
            dispatcher,
            server.clone(),
            watcher.clone(),
            shutdown,
            Duration::from_millis(20),
        ));

        let task = tokio::spawn({
            let daemon = daemon.clone();
            async move { daemon.run(Inbox::new(host_in)).await }
        });

        Running {
            daemon,
            task,
            upstream,
            replies: Replies::new(browser_in),
            server,
            watcher,
            socket,
            colors,
            _dir: dir,
        }
    }

    async fn send_frame(upstream: &mut DuplexStream, body: &[u8]) {
        let mut frame = Vec::new();
        frame.put_u32_ne(u32::try_from(body.len()).unwrap());
        frame.extend_from_slice(body);
        upstream.write_all(&frame).await.unwrap();
    }

    async fn wait_running(daemon: &Daemon) {
        timeout(WAIT, async {
            while daemon.state() != DaemonState::Running {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("daemon running");
    }

    #[tokio::test]
    async fn answers_requests_and_stops_on_disconnect() {
        let mut d = spawn_daemon().await;

        send_frame(&mut d.upstream, br#"{"action":"debug:version"}"#).await;
        let reply = d.replies.next().await;
        assert_eq!(reply.action, Action::Version);
        assert_eq!(d.daemon.state(), DaemonState::Running);

        drop(d.upstream);
        timeout(WAIT, d.task).await.unwrap().unwrap();

        assert_eq!(d.daemon.state(), DaemonState::Stopped);
        assert!(!d.server.close(), "server already closed by the daemon");
        assert!(!d.watcher.stop(), "watcher already stopped by the daemon");
        assert!(!d.socket.exists());
    }

    #[tokio::test]
    async fn malformed_frame_is_answered_not_fatal() {
        let mut d = spawn_daemon().await;

        send_frame(&mut d.upstream, b"{ not json").await;
        assert_eq!(d.replies.next().await.action, Action::InvalidAction);

        send_frame(&mut d.upstream, br#"{"action":"debug:version"}"#).await;
        assert_eq!(d.replies.next().await.action, Action::Version);
        d.daemon.stop();
        timeout(WAIT, d.task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_frame_is_answered_not_fatal() {
        let mut d = spawn_daemon().await;
        let len = 64 * 1024 * 1024 + 1;

        let mut prefix = Vec::new();
        prefix.put_u32_ne(len);
        d.upstream.write_all(&prefix).await.unwrap();
        let mut body = tokio::io::repeat(b' ').take(u64::from(len));
        timeout(WAIT, tokio::io::copy(&mut body, &mut d.upstream))
            .await
            .expect("daemon drains the oversized body")
            .unwrap();

        let reply = d.replies.next().await;
        assert_eq!(reply.action, Action::InvalidAction);
        assert!(reply.message.unwrap().contains("67108865"));

        send_frame(&mut d.upstream, br#"{"action":"debug:version"}"#).await;
        assert_eq!(d.replies.next().await.action, Action::Version);
        assert_eq!(d.daemon.state(), DaemonState::Running);

        d.daemon.stop();
        timeout(WAIT, d.task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn truncated_frame_shuts_down() {
        let mut d = spawn_daemon().await;

        let mut partial = Vec::new();
        partial.put_u32_ne(50);
        partial.extend_from_slice(br#"{"action""#);
        d.upstream.write_all(&partial).await.unwrap();
        drop(d.upstream);

        timeout(WAIT, d.task).await.unwrap().unwrap();
        assert_eq!(d.daemon.state(), DaemonState::Stopped);
    }

    #[tokio::test]
    async fn update_command_pushes_one_palette_and_nothing_to_cli() {
        let mut d = spawn_daemon().await;
        wait_running(&d.daemon).await;

        let mut cli = UnixStream::connect(&d.socket).await.unwrap();
        cli.write_all(b"update\n").await.unwrap();
        cli.shutdown().await.unwrap();
        let mut answer = Vec::new();
        timeout(WAIT, cli.read_to_end(&mut answer))
            .await
            .unwrap()
            .unwrap();
        assert!(answer.is_empty(), "the CLI never gets a reply");

        assert_eq!(d.replies.next().await.action, Action::Colors);
        d.replies.assert_quiet().await;

        send_command(&Endpoint::Unix(d.socket.clone()), Command::Theme(ThemeMode::Dark))
            .await
            .unwrap();
        let reply = d.replies.next().await;
        assert_eq!(reply.action, Action::ThemeMode);
        assert_eq!(reply.data, Some(serde_json::json!("dark")));

        d.daemon.stop();
        timeout(WAIT, d.task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn palette_change_is_pushed() {
        let mut d = spawn_daemon().await;
        wait_running(&d.daemon).await;

        fs::write(&d.colors, "#000000\n").unwrap();
        assert_eq!(d.replies.next().await.action, Action::Colors);

        d.daemon.stop();
        timeout(WAIT, d.task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn explicit_stop_closes_everything() {
        let d = spawn_daemon().await;
        wait_running(&d.daemon).await;

        d.daemon.stop();
        timeout(WAIT, d.task).await.unwrap().unwrap();

        assert_eq!(d.daemon.state(), DaemonState::Stopped);
        assert!(!d.server.close(), "server already closed by the daemon");
        assert!(!d.socket.exists());
        assert!(!d.watcher.stop());
    }

    #[tokio::test]
    async fn busy_socket_degrades_to_extension_only() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("pywalfox.sock");
        let colors = dir.path().join("colors");

        let other_shutdown = CancellationToken::new();
        let other = CommandServer::new(Endpoint::Unix(socket.clone()), &other_shutdown);
        let _other_commands = other.start().await.expect("first daemon binds");

        let mut d = spawn_daemon_with(dir, socket, colors).await;
        let notice = d.replies.next().await;
        assert_eq!(notice.action, Action::Output);

        send_frame(&mut d.upstream, br#"{"action":"debug:version"}"#).await;
        assert_eq!(d.replies.next().await.action, Action::Version);

        drop(d.upstream);
        timeout(WAIT, d.task).await.unwrap().unwrap();
        assert!(d.socket.exists(), "the other daemon's socket is left alone");
        other.close();
    }
}
