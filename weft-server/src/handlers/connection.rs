//! Per-connection handshake and message loop
//!
//! The same loop serves local control-socket peers and relay peers; only
//! the way access is decided differs.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weft_protocol::{
    AccessMode, ClientMessage, ErrorCode, ServerCodec, ServerMessage, PROTOCOL_VERSION,
};

use crate::commands::{Command, Origin};
use crate::config::RelayConfig;
use crate::registry::{ClientHello, ClientId};

use super::{HandlerContext, HandlerResult, SharedState};

/// How long a closing connection may spend flushing queued messages
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Where a connection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    /// Local control socket
    Local,
    /// Relay listener
    Relay(SocketAddr),
}

/// Check the first message of a connection. On failure returns the error
/// to send before closing.
pub fn accept_hello(
    msg: ClientMessage,
    peer: Peer,
    relay: &RelayConfig,
) -> Result<ClientHello, ServerMessage> {
    let ClientMessage::Connect {
        client_id,
        protocol_version,
        name,
        size,
        capabilities,
        environment,
        token,
    } = msg
    else {
        return Err(ServerMessage::Error {
            code: ErrorCode::InvalidArgument,
            message: "expected Connect".into(),
        });
    };

    if protocol_version != PROTOCOL_VERSION {
        return Err(ServerMessage::Error {
            code: ErrorCode::ProtocolMismatch,
            message: format!(
                "protocol version mismatch: client={}, server={}",
                protocol_version, PROTOCOL_VERSION
            ),
        });
    }

    let access = match peer {
        Peer::Local => AccessMode::ReadWrite,
        Peer::Relay(_) => relay_access(token.as_deref(), relay).ok_or_else(|| {
            ServerMessage::Error {
                code: ErrorCode::PermissionDenied,
                message: "invalid relay token".into(),
            }
        })?,
    };

    Ok(ClientHello {
        uuid: client_id,
        name,
        size: size.clamped(),
        capabilities,
        environment,
        access,
    })
}

/// Access a relay token grants, if any
fn relay_access(token: Option<&str>, relay: &RelayConfig) -> Option<AccessMode> {
    let token = token?;
    if relay.token_rw.as_deref() == Some(token) {
        Some(AccessMode::ReadWrite)
    } else if relay.token_ro.as_deref() == Some(token) {
        Some(AccessMode::ReadOnly)
    } else {
        None
    }
}

/// Serve one connection until it closes or the server shuts down
pub async fn handle_client<R, W>(reader: R, writer: W, state: SharedState, peer: Peer)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = FramedRead::new(reader, ServerCodec::new());
    let mut writer = FramedWrite::new(writer, ServerCodec::new());
    let config = state.config.load_full();

    let timeout = Duration::from_millis(config.server.attach_timeout_ms);
    let first = match tokio::time::timeout(timeout, reader.next()).await {
        Ok(Some(Ok(msg))) => msg,
        Ok(Some(Err(e))) => {
            debug!(?peer, error = %e, "bad handshake frame");
            return;
        }
        Ok(None) => return,
        Err(_) => {
            warn!(?peer, "no Connect within {}ms, closing", config.server.attach_timeout_ms);
            return;
        }
    };

    let hello = match accept_hello(first, peer, &config.relay) {
        Ok(hello) => hello,
        Err(refusal) => {
            debug!(?peer, ?refusal, "handshake refused");
            let _ = writer.send(refusal).await;
            return;
        }
    };

    let access = hello.access;
    let (tx, rx) = mpsc::channel(config.server.client_queue_depth);
    let client_id = state.registry.register_client(tx, hello);
    info!(client_id, ?peer, ?access, "client connected");
    state.registry.try_send_to_client(
        client_id,
        ServerMessage::Connected {
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION,
            client_id,
            access,
        },
    );

    let closed = CancellationToken::new();
    let mut writer_task = tokio::spawn(run_writer(client_id, writer, rx, closed.clone()));

    let ctx = HandlerContext::new(&state, client_id, access);
    loop {
        let msg = tokio::select! {
            _ = closed.cancelled() => break,
            _ = state.shutdown.cancelled() => break,
            next = reader.next() => match next {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    debug!(client_id, error = %e, "bad frame, closing connection");
                    break;
                }
                None => break,
            },
        };
        if let HandlerResult::Response(response) = ctx.route_message(msg).await {
            state.registry.try_send_to_client(client_id, response);
        }
    }

    disconnect(&state, client_id).await;
    if tokio::time::timeout(WRITER_DRAIN, &mut writer_task).await.is_err() {
        writer_task.abort();
    }
    info!(client_id, "client disconnected");
}

/// Deliver queued messages until the channel closes or an `Exit` has been
/// sent
async fn run_writer<W>(
    client_id: ClientId,
    mut writer: FramedWrite<W, ServerCodec>,
    mut rx: mpsc::Receiver<ServerMessage>,
    closed: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let exit = matches!(msg, ServerMessage::Exit { .. });
        if let Err(e) = writer.send(msg).await {
            debug!(client_id, error = %e, "write failed");
            break;
        }
        if exit {
            break;
        }
    }
    closed.cancel();
}

/// Drop the client from the registry and from the pane it watches. The
/// read lock keeps the worker from re-subscribing it in between.
async fn disconnect(state: &SharedState, client_id: ClientId) {
    let model = state.model.read().await;
    let Some((session, pane)) = state.registry.unregister_client(client_id) else {
        return;
    };
    if let Some((_, _, pane)) = pane.and_then(|id| model.find_pane(id)) {
        pane.terminal().lock().unsubscribe(client_id);
    }
    drop(model);

    if let Some(session) = session {
        state.queue.push(
            Command::ClientDetached {
                client: client_id,
                session,
            },
            Origin::server(),
        );
    }
}
