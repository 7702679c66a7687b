//! Delta computation against a shadow copy of what observers last saw

use weft_protocol::{Cell, CellRun, CursorState, GridDelta, PaneId};

use super::Grid;

/// Unchanged cells tolerated inside a run before it is split
const RUN_GAP: usize = 3;

/// Shadow of the screen as last published
#[derive(Debug, Default)]
pub struct DamageTracker {
    shadow: Vec<Vec<Cell>>,
    cursor: CursorState,
}

impl DamageTracker {
    /// Start tracking from the grid's current contents.
    pub fn new(grid: &Grid) -> Self {
        let mut tracker = Self::default();
        tracker.reset(grid);
        tracker
    }

    /// Forget previous state; the next delta is relative to `grid` as it is
    /// now. Called whenever a snapshot is published.
    pub fn reset(&mut self, grid: &Grid) {
        self.shadow = (0..grid.rows() as usize)
            .map(|r| grid.row(r).map(|row| row.cells.clone()).unwrap_or_default())
            .collect();
        self.cursor = grid.cursor();
    }

    /// Whether the shadow still matches the grid's dimensions
    pub fn matches(&self, grid: &Grid) -> bool {
        self.shadow.len() == grid.rows() as usize
            && self
                .shadow
                .first()
                .map_or(true, |r| r.len() == grid.cols() as usize)
    }

    /// Collect changes since the last call and clear the grid's damage.
    ///
    /// Returns `None` when nothing an observer can see has changed.
    pub fn take_delta(&mut self, grid: &mut Grid, pane_id: PaneId, seq: u64) -> Option<GridDelta> {
        let mut runs = Vec::new();
        let dirty: Vec<usize> = grid.dirty_rows().collect();
        for row_idx in dirty {
            let (Some(row), Some(shadow)) = (grid.row(row_idx), self.shadow.get_mut(row_idx)) else {
                continue;
            };
            diff_row(row_idx, &row.cells, shadow, &mut runs);
        }
        grid.clear_damage();

        let cursor = grid.cursor();
        let cursor_moved = cursor != self.cursor;
        self.cursor = cursor;

        let delta = GridDelta {
            pane_id,
            seq,
            runs,
            cursor,
            title: grid.take_title_change(),
            bell: grid.take_bell(),
        };
        if delta.is_empty() && !cursor_moved {
            None
        } else {
            Some(delta)
        }
    }
}

fn diff_row(row_idx: usize, current: &[Cell], shadow: &mut Vec<Cell>, runs: &mut Vec<CellRun>) {
    if shadow.len() != current.len() {
        shadow.resize(current.len(), Cell::blank());
    }

    let mut start: Option<usize> = None;
    let mut last_changed = 0;
    for (col, (cur, old)) in current.iter().zip(shadow.iter()).enumerate() {
        if cur == old {
            if let Some(s) = start {
                if col - last_changed > RUN_GAP {
                    push_run(row_idx, s, last_changed + 1, current, runs);
                    start = None;
                }
            }
            continue;
        }
        if start.is_none() {
            start = Some(col);
        }
        last_changed = col;
    }
    if let Some(s) = start {
        push_run(row_idx, s, last_changed + 1, current, runs);
    }

    shadow.copy_from_slice(current);
}

fn push_run(row: usize, start: usize, end: usize, cells: &[Cell], runs: &mut Vec<CellRun>) {
    runs.push(CellRun {
        row: row as u16,
        col: start as u16,
        cells: cells[start..end].to_vec(),
    });
}
