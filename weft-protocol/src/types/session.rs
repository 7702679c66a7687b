//! Session, window and pane descriptions

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Rect;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub const PREFIX: char = $prefix;

            /// Parse the prefixed form, e.g. `%3`
            pub fn parse(s: &str) -> Option<Self> {
                s.strip_prefix($prefix)?.parse().ok().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

numeric_id!(
    /// Server-unique session identifier, printed as `$n`
    SessionId,
    '$'
);
numeric_id!(
    /// Server-unique window identifier, printed as `@n`
    WindowId,
    '@'
);
numeric_id!(
    /// Server-unique pane identifier, printed as `%n`
    PaneId,
    '%'
);

/// Pane lifecycle as seen by clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaneState {
    Running,
    /// Process exited; the pane is kept because `remain-on-exit` is set
    Exited { status: Option<i32> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub name: String,
    pub window_count: usize,
    pub attached_clients: usize,
    /// Seconds since the Unix epoch
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub session_id: SessionId,
    pub index: u32,
    pub name: String,
    pub active: bool,
    pub pane_count: usize,
    pub cols: u16,
    pub rows: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaneInfo {
    pub id: PaneId,
    pub window_id: WindowId,
    pub index: u32,
    pub rect: Rect,
    pub title: String,
    pub active: bool,
    pub state: PaneState,
}
