//! Starting the server on demand
//!
//! When nothing answers on the control socket the client spawns
//! `weft-server` for that socket and waits for it to come up.

use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use weft_utils::{Result, WeftError};

#[derive(Debug, Clone)]
pub struct AutoStartConfig {
    pub enabled: bool,
    /// How long to wait for the server socket (milliseconds)
    pub timeout_ms: u64,
    pub retry_delay_ms: u64,
    /// Delay before the first probe after spawning (milliseconds)
    pub initial_delay_ms: u64,
}

impl Default for AutoStartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 2000,
            retry_delay_ms: 50,
            initial_delay_ms: 20,
        }
    }
}

const SERVER_BINARY_NAME: &str = "weft-server";

/// Find the server binary beside the running client, then on `PATH`
pub fn find_server_binary() -> Result<PathBuf> {
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(parent) = current_exe.parent() {
            let server_path = parent.join(SERVER_BINARY_NAME);
            if server_path.is_file() {
                tracing::debug!(path = %server_path.display(), "found server binary");
                return Ok(server_path);
            }
        }
    }
    if let Ok(path) = which::which(SERVER_BINARY_NAME) {
        tracing::debug!(path = %path.display(), "found server binary in PATH");
        return Ok(path);
    }
    Err(WeftError::ProcessSpawn(format!(
        "{} not found beside weft or in PATH",
        SERVER_BINARY_NAME
    )))
}

/// Spawn the server for `socket`, detached from this terminal
pub fn start_server_daemon(socket: &Path) -> Result<()> {
    let server_path = find_server_binary()?;
    tracing::info!(server = %server_path.display(), socket = %socket.display(), "starting server");

    Command::new(&server_path)
        .arg("--socket")
        .arg(socket)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|e| {
            WeftError::ProcessSpawn(format!("failed to start {}: {}", server_path.display(), e))
        })?;
    Ok(())
}

/// Whether a server answers on `socket`
pub async fn check_server_available(socket: &Path) -> bool {
    socket.exists() && tokio::net::UnixStream::connect(socket).await.is_ok()
}

/// Poll until the server answers or the timeout passes
pub async fn wait_for_server(socket: &Path, config: &AutoStartConfig) -> Result<()> {
    let start = Instant::now();
    let timeout = Duration::from_millis(config.timeout_ms);
    tokio::time::sleep(Duration::from_millis(config.initial_delay_ms)).await;

    loop {
        if check_server_available(socket).await {
            tracing::debug!(elapsed = ?start.elapsed(), "server is up");
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(WeftError::ConnectionTimeout {
                millis: config.timeout_ms,
            });
        }
        tokio::time::sleep(Duration::from_millis(config.retry_delay_ms)).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStartResult {
    AlreadyRunning,
    Started,
    /// Not running and auto-start is disabled
    NotRunning,
}

pub async fn ensure_server_running(
    socket: &Path,
    config: &AutoStartConfig,
) -> Result<ServerStartResult> {
    if check_server_available(socket).await {
        return Ok(ServerStartResult::AlreadyRunning);
    }
    if !config.enabled {
        return Ok(ServerStartResult::NotRunning);
    }
    start_server_daemon(socket)?;
    wait_for_server(socket, config).await?;
    Ok(ServerStartResult::Started)
}
