//! weft-protocol: Shared IPC definitions for client-server communication
//!
//! This crate defines the message types, screen cell types and the framing
//! codec used between weft clients and the server, over the local control
//! socket or a relay connection.

pub mod codec;
pub mod messages;
pub mod types;

// Re-export main types at crate root
pub use codec::{ClientCodec, CodecError, ServerCodec};
pub use messages::{ClientMessage, ErrorCode, ExitReason, ServerMessage};
pub use types::{
    AccessMode, Attrs, Capabilities, Cell, CellRun, Color, ColorDepth, CursorShape, CursorState,
    Dimensions, GridDelta, GridSnapshot, PaneId, PaneInfo, PaneState, Rect, SessionId,
    SessionInfo, SplitDirection, WindowId, WindowInfo, MAX_DIMENSION,
};

/// Current protocol version
pub const PROTOCOL_VERSION: u32 = 1;
