//! weft client - attach to a weft server or run a command on it

use std::process::ExitCode;

use weft_protocol::{ClientMessage, Dimensions, ServerMessage};
use weft_utils::{init_logging_with_config, LogConfig, Result, WeftError};

mod auto_start;
mod cli;
mod connection;
mod input;
mod mirror;
mod ui;

use auto_start::{ensure_server_running, AutoStartConfig, ServerStartResult};
use cli::{Args, Mode};
use connection::{Connection, Endpoint, Hello};
use ui::{session_size, App};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse_args();
    if let Err(e) = init_logging_with_config(LogConfig::client()) {
        eprintln!("weft: logging disabled: {}", e);
    }
    tracing::debug!(command = ?args.command, "weft client starting");

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("weft client error: {}", e);
            eprintln!("weft: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let endpoint = args.endpoint()?;
    let mode = args.mode();

    if let Endpoint::Unix(socket) = &endpoint {
        let config = AutoStartConfig {
            enabled: args.auto_start_enabled() && mode.starts_server(),
            timeout_ms: args.server_timeout,
            ..Default::default()
        };
        match ensure_server_running(socket, &config).await? {
            ServerStartResult::AlreadyRunning => {}
            ServerStartResult::Started => tracing::info!("server started"),
            ServerStartResult::NotRunning => {
                return Err(WeftError::ServerNotRunning {
                    path: socket.clone(),
                });
            }
        }
    }

    let size = if mode.is_interactive() {
        let (cols, rows) = crossterm::terminal::size()?;
        let (cols, rows) = session_size(cols, rows);
        Dimensions::new(cols, rows)
    } else {
        Dimensions::default()
    };

    let mut conn = Connection::new(endpoint);
    conn.connect().await?;
    let welcome = conn
        .handshake(Hello::from_environment(size, args.token.clone()))
        .await?;
    tracing::info!(
        endpoint = %conn.endpoint(),
        client_id = welcome.client_id,
        server_version = %welcome.server_version,
        "connected"
    );

    let first = match mode {
        Mode::Command(argv) => return run_command(conn, argv).await,
        Mode::Attach { target, create } => ClientMessage::Attach { target, create },
        Mode::Interactive(argv) => ClientMessage::Command {
            request_id: 0,
            argv,
        },
    };

    let outcome = App::new(conn, welcome.access).run(first).await?;
    if outcome.is_error() {
        eprintln!("{}", outcome.describe());
        Ok(ExitCode::FAILURE)
    } else {
        println!("{}", outcome.describe());
        Ok(ExitCode::SUCCESS)
    }
}

/// Run one command and print what it returns
async fn run_command(mut conn: Connection, argv: Vec<String>) -> Result<ExitCode> {
    const REQUEST: u32 = 1;
    conn.send(ClientMessage::Command {
        request_id: REQUEST,
        argv,
    })
    .await?;

    let code = loop {
        let Some(msg) = conn.recv().await else {
            return Err(WeftError::ConnectionClosed);
        };
        match msg {
            ServerMessage::CommandResult { request_id, output } if request_id == REQUEST => {
                for line in output {
                    println!("{}", line);
                }
                break ExitCode::SUCCESS;
            }
            ServerMessage::CommandFailed {
                request_id,
                message,
                ..
            } if request_id == REQUEST => {
                eprintln!("{}", message);
                break ExitCode::FAILURE;
            }
            ServerMessage::Error { message, .. } => {
                eprintln!("{}", message);
                break ExitCode::FAILURE;
            }
            other => tracing::debug!(message = ?other, "ignored while waiting for command result"),
        }
    };
    conn.disconnect().await;
    Ok(code)
}
