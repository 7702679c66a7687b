//! PTY management for the weft server
//!
//! Pseudo-terminal creation through portable-pty, with the master side
//! driven by the tokio reactor.

mod channel;
mod config;
mod manager;

pub use channel::{ExitWatcher, PtyChannel, PtyReader, PtyWriter};
pub use config::{PtyConfig, DEFAULT_TERM};
pub use manager::PtyManager;
