//! Client-server message types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::*;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientMessage {
    /// Initial connection handshake, must be the first message
    Connect {
        client_id: Uuid,
        protocol_version: u32,
        /// Human-readable client name (usually the tty)
        name: String,
        size: Dimensions,
        capabilities: Capabilities,
        /// Environment of the client process, consulted through the
        /// `update-environment` option
        environment: Vec<(String, String)>,
        /// Access token, required on relay connections
        token: Option<String>,
    },

    /// Attach to a session, creating one when `create` is set and no
    /// session matches
    Attach {
        target: Option<String>,
        create: bool,
    },

    /// Detach from the current session (session keeps running)
    Detach,

    /// The client terminal changed size
    Resize { cols: u16, rows: u16 },

    /// Keyboard or mouse bytes for the active pane
    Input { data: Vec<u8> },

    /// Run a command, e.g. `["split-window", "-h"]`
    Command { request_id: u32, argv: Vec<String> },

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerMessage {
    /// Connection accepted
    Connected {
        server_version: String,
        protocol_version: u32,
        /// Registry id assigned to this client
        client_id: u64,
        access: AccessMode,
    },

    /// Full screen of the pane the client is now watching
    GridSnapshot(GridSnapshot),

    /// Incremental screen update for the watched pane
    GridDelta(GridDelta),

    /// Attached to a session
    Attached {
        session: SessionInfo,
        window: WindowInfo,
        panes: Vec<PaneInfo>,
    },

    /// The current window's layout or focus changed
    Layout {
        session: SessionInfo,
        window: WindowInfo,
        panes: Vec<PaneInfo>,
    },

    /// Command completed
    CommandResult { request_id: u32, output: Vec<String> },

    /// Command failed; nothing was changed
    CommandFailed {
        request_id: u32,
        code: ErrorCode,
        message: String,
    },

    /// A pane's process exited
    PaneExited { pane_id: PaneId, status: Option<i32> },

    /// The client is being let go; the connection closes after this
    Exit { reason: ExitReason },

    /// Error response
    Error { code: ErrorCode, message: String },

    /// Pong response to ping
    Pong,
}

/// Why the server is ending a client's attachment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    Detached,
    SessionClosed,
    ServerExited,
}

/// Error codes for error responses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    SessionNotFound,
    WindowNotFound,
    PaneNotFound,
    SessionExists,
    InvalidArgument,
    UnknownCommand,
    PermissionDenied,
    /// Input from a read-only client
    ReadOnly,
    NotAttached,
    ProtocolMismatch,
    /// pty or socket allocation failed
    ResourceError,
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== ClientMessage Tests ====================

    #[test]
    fn test_connect_serde() {
        let msg = ClientMessage::Connect {
            client_id: Uuid::new_v4(),
            protocol_version: 1,
            name: "/dev/pts/3".into(),
            size: Dimensions::new(120, 40),
            capabilities: Capabilities::default(),
            environment: vec![("TERM".into(), "xterm-256color".into())],
            token: Some("rw-token".into()),
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let back: ClientMessage = bincode::deserialize(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn test_command_argv_preserved() {
        let msg = ClientMessage::Command {
            request_id: 9,
            argv: vec!["rename-window".into(), "two words".into()],
        };
        let bytes = bincode::serialize(&msg).unwrap();
        match bincode::deserialize::<ClientMessage>(&bytes).unwrap() {
            ClientMessage::Command { request_id, argv } => {
                assert_eq!(request_id, 9);
                assert_eq!(argv[1], "two words");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    // ==================== ServerMessage Tests ====================

    #[test]
    fn test_delta_message_serde() {
        let msg = ServerMessage::GridDelta(GridDelta {
            pane_id: PaneId(4),
            seq: 12,
            runs: vec![CellRun {
                row: 2,
                col: 5,
                cells: vec![Cell { ch: 'q', ..Cell::blank() }],
            }],
            cursor: CursorState {
                row: 2,
                col: 6,
                visible: true,
                ..CursorState::default()
            },
            title: Some("vim".into()),
            bell: false,
        });
        let bytes = bincode::serialize(&msg).unwrap();
        let back: ServerMessage = bincode::deserialize(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn test_error_message() {
        let msg = ServerMessage::Error {
            code: ErrorCode::ReadOnly,
            message: "client is read-only".into(),
        };
        match msg {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::ReadOnly),
            _ => unreachable!(),
        }
    }
}
