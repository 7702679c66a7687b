//! weft server - Background daemon

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use weft_utils::{config_file, socket_path_for_label, LogConfig, Result, WeftError};

mod commands;
mod config;
mod grid;
mod handlers;
mod hooks;
mod options;
mod pane_io;
mod pty;
mod registry;
mod relay;
mod session;

use commands::{run_worker, Command, CommandQueue, Executor, Origin};
use config::{new_config_handle, ConfigLoader, ConfigWatcher};
use handlers::{handle_client, Peer, SharedState};
use hooks::HookKind;
use options::{OptionTree, ScopeTarget};
use registry::ClientRegistry;
use session::SessionManager;

/// How long the worker gets to finish after shutdown
const WORKER_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "weft-server", version, about = "weft terminal multiplexer server")]
struct Args {
    /// Control socket path
    #[arg(short = 'S', long, env = "WEFT_SOCKET")]
    socket: Option<PathBuf>,

    /// Socket label inside the per-user socket directory
    #[arg(short = 'L', long)]
    label: Option<String>,

    /// Configuration file
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Log verbosely to stderr instead of the log file
    #[arg(short = 'D', long)]
    foreground: bool,

    /// Do not reload the configuration file when it changes
    #[arg(long)]
    no_watch: bool,
}

/// Bind the control socket, replacing a stale one. Fails if a live server
/// already answers on it.
async fn bind_socket(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        if UnixStream::connect(path).await.is_ok() {
            return Err(WeftError::Bind {
                addr: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    "a server is already running",
                ),
            });
        }
        debug!(path = %path.display(), "removing stale socket");
        std::fs::remove_file(path).map_err(|e| WeftError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    UnixListener::bind(path).map_err(|e| WeftError::Bind {
        addr: path.display().to_string(),
        source: e,
    })
}

/// Turn SIGTERM/SIGINT/SIGHUP into a queued kill-server so clients are
/// told before the server goes away
async fn forward_signals(queue: CommandQueue, shutdown: CancellationToken) {
    let (mut term, mut int, mut hup) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(term), Ok(int), Ok(hup)) => (term, int, hup),
        _ => {
            error!("failed to install signal handlers");
            return;
        }
    };

    let name = tokio::select! {
        _ = shutdown.cancelled() => return,
        _ = term.recv() => "SIGTERM",
        _ = int.recv() => "SIGINT",
        _ = hup.recv() => "SIGHUP",
    };
    info!(signal = name, "shutting down on signal");
    if !queue.push(Command::KillServer, Origin::server()) {
        shutdown.cancel();
    }
}

async fn run_server(args: Args) -> Result<()> {
    let app_config = ConfigLoader::load_and_validate(args.config.as_deref())?;
    let config_path = args.config.clone().unwrap_or_else(config_file);

    let socket = match args.socket {
        Some(path) => path,
        None => socket_path_for_label(
            args.label
                .as_deref()
                .or(app_config.server.label.as_deref()),
        )?,
    };
    let listener = bind_socket(&socket).await?;
    info!(socket = %socket.display(), pid = std::process::id(), "weft server starting");

    let options = Arc::new(OptionTree::with_environment_defaults());
    for (name, value) in app_config.option_values() {
        if let Err(e) = options.set_str(&name, &value, ScopeTarget::Server) {
            warn!(option = %name, error = %e, "ignoring configured option");
        }
    }

    let registry = Arc::new(ClientRegistry::new());
    let model = Arc::new(RwLock::new(SessionManager::new()));
    let shutdown = CancellationToken::new();
    let (queue, queue_rx) = CommandQueue::new();
    let mut executor = Executor::new(
        options,
        Arc::clone(&registry),
        queue.clone(),
        socket.clone(),
        shutdown.clone(),
    )
    .with_default_size(app_config.server.default_size());
    for kind in HookKind::ALL {
        executor.register_hook(kind, hooks::event_logger());
    }
    let worker = tokio::spawn(run_worker(queue_rx, executor, Arc::clone(&model), shutdown.clone()));

    let relay_listen = app_config.relay.listen.clone();
    let state = SharedState {
        model,
        registry,
        queue: queue.clone(),
        config: new_config_handle(app_config),
        shutdown: shutdown.clone(),
    };

    if let Some(addr) = relay_listen {
        let relay_listener = relay::bind(&addr).await?;
        tokio::spawn(relay::run_accept_loop(relay_listener, state.clone()));
    }

    if !args.no_watch {
        match ConfigWatcher::new(config_path) {
            Ok(watcher) => {
                tokio::spawn(watcher.run(state.config.clone(), queue.clone(), shutdown.clone()));
            }
            Err(e) => warn!(error = %e, "config hot-reload disabled"),
        }
    }

    tokio::spawn(forward_signals(queue, shutdown.clone()));

    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, _)) => {
                    let state = state.clone();
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        handle_client(reader, writer, state, Peer::Local).await;
                    });
                }
                Err(e) => error!(error = %e, "accept error"),
            },
            _ = shutdown.cancelled() => break,
        }
    }

    if let Err(e) = std::fs::remove_file(&socket) {
        debug!(error = %e, "socket already removed");
    }
    if tokio::time::timeout(WORKER_GRACE, worker).await.is_err() {
        warn!("command worker did not stop in time");
    }
    info!("weft server stopped");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_config = if args.foreground {
        LogConfig::development()
    } else {
        LogConfig::server()
    };
    weft_utils::init_logging_with_config(log_config)?;

    if let Err(e) = run_server(args).await {
        error!(error = %e, "server failed");
        return Err(e);
    }
    Ok(())
}
