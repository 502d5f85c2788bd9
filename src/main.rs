mod command_ipc;
mod config;
mod daemon;
mod error;
mod firefox;
mod install;
mod logging;
mod native_ipc;
mod pywal;
mod watcher;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::{
    command_ipc::{send_command, Command, CommandServer, Endpoint, ThemeMode},
    config::{Config, DAEMON_VERSION},
    daemon::{Daemon, Dispatcher},
    error::Result,
    firefox::{ChromeStylesheets, FirefoxProfiles},
    install::Installation,
    logging::{init_file_logging, init_stderr_logging},
    pywal::PywalPalette,
    watcher::ChangeWatcher,
};

#[derive(Parser)]
#[command(name = "pywalfox-host")]
#[command(about = "Native messaging host for the Pywalfox browser extension", version)]
struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon on stdin/stdout (started by the browser)
    Start {
        /// Manifest path and extension id passed by the browser
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
        browser_args: Vec<String>,
    },
    /// Push the current pywal colors to the browser
    Update,
    /// Switch the browser to the dark theme
    Dark,
    /// Switch the browser to the light theme
    Light,
    /// Let the extension pick the theme
    Auto,
    /// Register the native messaging manifest with Firefox
    Install,
    /// Remove the native messaging manifest
    Uninstall,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start { browser_args } => {
            let config = Config::from_env();
            init_file_logging(&config, cli.debug);
            tracing::debug!("Started by the browser with {browser_args:?}");
            run_daemon(config).await;
            // The blocking stdin reader cannot be cancelled; exit instead of
            // waiting for the runtime to reclaim it.
            std::process::exit(0);
        }
        Commands::Update => {
            init_stderr_logging(cli.debug);
            run_command(Command::Update).await
        }
        Commands::Dark => {
            init_stderr_logging(cli.debug);
            run_command(Command::Theme(ThemeMode::Dark)).await
        }
        Commands::Light => {
            init_stderr_logging(cli.debug);
            run_command(Command::Theme(ThemeMode::Light)).await
        }
        Commands::Auto => {
            init_stderr_logging(cli.debug);
            run_command(Command::Theme(ThemeMode::Auto)).await
        }
        Commands::Install => {
            init_stderr_logging(cli.debug);
            install()
        }
        Commands::Uninstall => {
            init_stderr_logging(cli.debug);
            uninstall()
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_daemon(config: Config) {
    tracing::info!("Starting daemon v{DAEMON_VERSION}");

    let shutdown = CancellationToken::new();
    let server = Arc::new(CommandServer::new(config.endpoint.clone(), &shutdown));
    let watcher = Arc::new(ChangeWatcher::new(config.colors_file()));
    let (inbox, outbox) = native_ipc::channel(tokio::io::stdin(), tokio::io::stdout());
    let dispatcher = Dispatcher::new(
        outbox,
        &FirefoxProfiles::new(config.profiles_dir.clone()),
        Arc::new(PywalPalette::new(&config.wal_dir)),
        Arc::new(ChromeStylesheets::new(&config.css_dir)),
    );
    let daemon = Arc::new(Daemon::new(
        dispatcher,
        server,
        watcher,
        shutdown,
        config.watch_debounce,
    ));

    tokio::spawn(stop_on_signal(daemon.clone()));
    daemon.run(inbox).await;
}

async fn stop_on_signal(daemon: Arc<Daemon>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(e) => {
                tracing::warn!("Could not listen for SIGTERM: {e}");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }

    tracing::info!("Received termination signal");
    daemon.stop();
}

async fn run_command(command: Command) -> Result<()> {
    let endpoint = Endpoint::from_env();
    tracing::debug!("Sending {command} to {endpoint}");
    send_command(&endpoint, command).await
}

fn install() -> Result<()> {
    let installation = Installation::for_current_user()?;
    installation.install()?;
    println!(
        "Installed the native messaging host at {}",
        installation.manifest_path().display()
    );
    Ok(())
}

fn uninstall() -> Result<()> {
    let installation = Installation::for_current_user()?;
    if installation.uninstall()? {
        println!("Removed the native messaging host");
    } else {
        println!("The native messaging host was not installed");
    }
    Ok(())
}
