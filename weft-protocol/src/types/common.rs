use serde::{Deserialize, Serialize};

/// Split direction for creating panes
///
/// `Horizontal` places the new pane beside the old one (left/right),
/// `Vertical` places it below (top/bottom).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

/// Largest width or height a client may report
pub const MAX_DIMENSION: u16 = 1000;

/// Terminal dimensions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dimensions {
    pub cols: u16,
    pub rows: u16,
}

impl Dimensions {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Both sides brought into `1..=MAX_DIMENSION`
    pub fn clamped(self) -> Self {
        Self {
            cols: self.cols.clamp(1, MAX_DIMENSION),
            rows: self.rows.clamp(1, MAX_DIMENSION),
        }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// A rectangle inside a window, in cells
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub cols: u16,
    pub rows: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, cols: u16, rows: u16) -> Self {
        Self { x, y, cols, rows }
    }

    pub fn area(&self) -> u32 {
        self.cols as u32 * self.rows as u32
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.cols, self.rows)
    }
}

/// What a connected client is allowed to do
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessMode {
    /// May watch and run queries, never write to a pane
    ReadOnly,
    /// Full control
    ReadWrite,
}

impl AccessMode {
    pub fn can_write(&self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

/// Colour support of the client terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColorDepth {
    Mono,
    Ansi16,
    Ansi256,
    TrueColor,
}

/// Capabilities announced by a client at connect time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities {
    pub color_depth: ColorDepth,
    pub utf8: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            color_depth: ColorDepth::Ansi256,
            utf8: true,
        }
    }
}
