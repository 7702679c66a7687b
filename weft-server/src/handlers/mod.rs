//! Message handlers for client requests
//!
//! Routes incoming `ClientMessage`s for one connected client. Structural
//! requests go through the command queue; input and keepalives are handled
//! here directly.

mod connection;
mod input;
mod session;

pub use connection::{accept_hello, handle_client, Peer};

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use weft_protocol::{AccessMode, ClientMessage, ErrorCode, ServerMessage};

use crate::commands::{CommandQueue, Origin};
use crate::config::ConfigHandle;
use crate::registry::{ClientId, ClientRegistry};
use crate::session::SessionManager;

/// Server state shared by every connection
#[derive(Clone)]
pub struct SharedState {
    pub model: Arc<RwLock<SessionManager>>,
    pub registry: Arc<ClientRegistry>,
    pub queue: CommandQueue,
    pub config: ConfigHandle,
    pub shutdown: CancellationToken,
}

/// Context for message handlers
pub struct HandlerContext {
    pub model: Arc<RwLock<SessionManager>>,
    pub registry: Arc<ClientRegistry>,
    pub queue: CommandQueue,
    /// The client making this request
    pub client_id: ClientId,
    pub access: AccessMode,
}

/// Result of handling a message
#[derive(Debug, PartialEq)]
pub enum HandlerResult {
    /// Single response to send back to the client
    Response(ServerMessage),
    /// Nothing to send; any output was delivered through the registry
    NoResponse,
}

impl HandlerContext {
    pub fn new(state: &SharedState, client_id: ClientId, access: AccessMode) -> Self {
        Self {
            model: Arc::clone(&state.model),
            registry: Arc::clone(&state.registry),
            queue: state.queue.clone(),
            client_id,
            access,
        }
    }

    fn origin(&self) -> Origin {
        Origin::client(self.client_id, self.access)
    }

    /// Route a client message to the appropriate handler
    pub async fn route_message(&self, msg: ClientMessage) -> HandlerResult {
        match msg {
            ClientMessage::Connect { .. } => {
                Self::error(ErrorCode::InvalidArgument, "already connected")
            }

            ClientMessage::Ping => HandlerResult::Response(ServerMessage::Pong),

            ClientMessage::Attach { target, create } => self.handle_attach(target, create).await,

            ClientMessage::Detach => self.handle_detach().await,

            ClientMessage::Command { request_id, argv } => {
                self.handle_command(request_id, argv).await
            }

            ClientMessage::Resize { cols, rows } => self.handle_resize(cols, rows),

            ClientMessage::Input { data } => self.handle_input(data).await,
        }
    }

    /// Create an error response
    pub fn error(code: ErrorCode, message: impl Into<String>) -> HandlerResult {
        HandlerResult::Response(ServerMessage::Error {
            code,
            message: message.into(),
        })
    }
}

impl From<ServerMessage> for HandlerResult {
    fn from(msg: ServerMessage) -> Self {
        HandlerResult::Response(msg)
    }
}
