//! Session management for the weft server
//!
//! Provides the session/window/pane hierarchy that organizes
//! terminal processes, and the layout tree that places panes in a window.

pub mod layout;
mod manager;
mod pane;
#[allow(clippy::module_inception)]
mod session;
mod window;

pub use layout::{Direction, LayoutError, LayoutPreset, LayoutTree};
pub use manager::SessionManager;
pub use pane::Pane;
pub use session::Session;
pub use window::Window;
