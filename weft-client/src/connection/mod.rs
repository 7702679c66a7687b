//! Client-server connection management
//!
//! Unix socket or relay TCP connection to the weft server with message
//! framing handled by a background task.

mod client;
mod endpoint;

pub use client::{Connection, ConnectionState, Hello, Welcome};
pub use endpoint::Endpoint;
