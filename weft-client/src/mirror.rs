//! Client-side copy of the observed pane's screen
//!
//! Built from a `GridSnapshot` and kept current by applying `GridDelta`s in
//! sequence. A delta for another pane or out of sequence is dropped; the
//! server follows up with a fresh snapshot.

use weft_protocol::types::row_to_string;
use weft_protocol::{Cell, CursorState, GridDelta, GridSnapshot, PaneId};

#[derive(Debug, Clone)]
pub struct MirrorGrid {
    pane_id: PaneId,
    seq: u64,
    cols: u16,
    rows: u16,
    cells: Vec<Vec<Cell>>,
    cursor: CursorState,
    title: String,
    bell: bool,
}

impl MirrorGrid {
    pub fn from_snapshot(snapshot: GridSnapshot) -> Self {
        let cols = snapshot.cols;
        let rows = snapshot.rows;
        let mut cells = snapshot.cells;
        cells.resize_with(rows as usize, Vec::new);
        for row in &mut cells {
            row.resize(cols as usize, Cell::blank());
        }
        Self {
            pane_id: snapshot.pane_id,
            seq: snapshot.seq,
            cols,
            rows,
            cells,
            cursor: clamp_cursor(snapshot.cursor, cols, rows),
            title: snapshot.title,
            bell: false,
        }
    }

    pub fn pane_id(&self) -> PaneId {
        self.pane_id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.cells.get(row as usize)?.get(col as usize)
    }

    pub fn row_text(&self, row: u16) -> String {
        self.cells
            .get(row as usize)
            .map(|cells| row_to_string(cells))
            .unwrap_or_default()
    }

    /// Fold in the next delta. Returns false when it was dropped.
    pub fn apply_delta(&mut self, delta: GridDelta) -> bool {
        if delta.pane_id != self.pane_id {
            tracing::debug!(pane_id = %delta.pane_id, mirror = %self.pane_id, "delta for another pane");
            return false;
        }
        if delta.seq != self.seq + 1 {
            tracing::warn!(
                pane_id = %self.pane_id,
                expected = self.seq + 1,
                got = delta.seq,
                "delta out of sequence"
            );
            return false;
        }

        for run in delta.runs {
            let Some(row) = self.cells.get_mut(run.row as usize) else {
                continue;
            };
            let start = run.col as usize;
            for (offset, cell) in run.cells.into_iter().enumerate() {
                match row.get_mut(start + offset) {
                    Some(slot) => *slot = cell,
                    None => break,
                }
            }
        }
        self.cursor = clamp_cursor(delta.cursor, self.cols, self.rows);
        if let Some(title) = delta.title {
            self.title = title;
        }
        self.bell |= delta.bell;
        self.seq = delta.seq;
        true
    }

    /// Whether a bell rang since the last call
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }
}

fn clamp_cursor(mut cursor: CursorState, cols: u16, rows: u16) -> CursorState {
    cursor.col = cursor.col.min(cols.saturating_sub(1));
    cursor.row = cursor.row.min(rows.saturating_sub(1));
    cursor
}
