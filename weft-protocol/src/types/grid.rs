//! Screen cell types shared by the server's terminal grid and the client
//! mirror.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::PaneId;

/// Cell colour
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

bitflags! {
    /// Rendition flags set by SGR
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Attrs: u16 {
        const BOLD          = 0b0000_0000_0001;
        const DIM           = 0b0000_0000_0010;
        const ITALIC        = 0b0000_0000_0100;
        const UNDERLINE     = 0b0000_0000_1000;
        const BLINK         = 0b0000_0001_0000;
        const REVERSE       = 0b0000_0010_0000;
        const HIDDEN        = 0b0000_0100_0000;
        const STRIKETHROUGH = 0b0000_1000_0000;
    }
}

/// One screen cell
///
/// `width` is 1 for ordinary glyphs and 2 for the leading half of a wide
/// glyph. The trailing half of a wide glyph is a continuation cell with
/// width 0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub width: u8,
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank()
    }
}

impl Cell {
    pub const fn blank() -> Self {
        Self {
            ch: ' ',
            width: 1,
            fg: Color::Default,
            bg: Color::Default,
            attrs: Attrs::empty(),
        }
    }

    /// Blank cell carrying the background of the current pen, as erase
    /// operations produce.
    pub fn erased(bg: Color) -> Self {
        Self {
            bg,
            ..Self::blank()
        }
    }

    pub fn continuation(fg: Color, bg: Color, attrs: Attrs) -> Self {
        Self {
            ch: ' ',
            width: 0,
            fg,
            bg,
            attrs,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    pub fn is_wide(&self) -> bool {
        self.width == 2
    }
}

/// Cursor style selected with DECSCUSR
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Cursor position and appearance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CursorState {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
    pub shape: CursorShape,
    pub blinking: bool,
}

/// Full contents of a pane's visible screen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridSnapshot {
    pub pane_id: PaneId,
    /// Sequence number of the last delta folded into this snapshot
    pub seq: u64,
    pub cols: u16,
    pub rows: u16,
    /// `rows` rows of exactly `cols` cells each
    pub cells: Vec<Vec<Cell>>,
    pub wrapped: Vec<bool>,
    pub cursor: CursorState,
    pub title: String,
}

impl GridSnapshot {
    /// Text of one row with trailing blanks removed
    pub fn row_text(&self, row: usize) -> String {
        self.cells
            .get(row)
            .map(|cells| row_to_string(cells))
            .unwrap_or_default()
    }
}

/// A run of changed cells starting at (`row`, `col`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellRun {
    pub row: u16,
    pub col: u16,
    pub cells: Vec<Cell>,
}

/// Incremental update produced by one output cycle of a pane
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridDelta {
    pub pane_id: PaneId,
    /// Increases by one per delta; a snapshot with `seq = n` is followed by
    /// delta `n + 1`
    pub seq: u64,
    pub runs: Vec<CellRun>,
    pub cursor: CursorState,
    /// Set when the title changed during this cycle
    pub title: Option<String>,
    pub bell: bool,
}

impl GridDelta {
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.title.is_none() && !self.bell
    }
}

/// Render a row of cells as text, skipping continuation cells and trimming
/// trailing spaces.
pub fn row_to_string(cells: &[Cell]) -> String {
    let mut s: String = cells
        .iter()
        .filter(|c| !c.is_continuation())
        .map(|c| c.ch)
        .collect();
    let trimmed = s.trim_end_matches(' ').len();
    s.truncate(trimmed);
    s
}
