//! TCP listener for remote relay peers
//!
//! Relay connections use the same framing as the control socket. Access is
//! decided by the token a peer presents in `Connect`.

use tokio::net::TcpListener;
use tracing::{debug, error, info};
use weft_utils::{Result, WeftError};

use crate::handlers::{handle_client, Peer, SharedState};

/// Bind the relay listener
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await.map_err(|e| WeftError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;
    info!(addr, "relay listener bound");
    Ok(listener)
}

/// Accept relay peers until shutdown
pub async fn run_accept_loop(listener: TcpListener, state: SharedState) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        debug!(%peer_addr, "relay connection");
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(%peer_addr, error = %e, "set_nodelay failed");
                        }
                        let state = state.clone();
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            handle_client(reader, writer, state, Peer::Relay(peer_addr)).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "relay accept error");
                    }
                }
            }
            _ = state.shutdown.cancelled() => {
                info!("stopping relay listener");
                break;
            }
        }
    }
}
