//! Screen state driven by the parser
//!
//! [`Grid`] owns the visible rows of both the primary and alternate screens,
//! the cursor, the current pen, the scroll region and the scrollback ring.
//! Cursor position is kept inside the screen at all times; the "one past the
//! last column" state needed for autowrap is tracked by `pending_wrap`.

use std::collections::VecDeque;

use tracing::trace;
use unicode_width::UnicodeWidthChar;
use weft_protocol::{Attrs, Cell, Color, CursorShape, CursorState, GridSnapshot, PaneId};

use super::parser::{Action, CsiSequence, Parser};

/// Default scrollback bound when no option overrides it
pub const DEFAULT_HISTORY_LIMIT: usize = 2000;

const TAB_WIDTH: usize = 8;

/// One screen row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    /// The row ended because text wrapped, not because of a newline
    pub wrapped: bool,
}

impl Row {
    pub fn new(cols: usize) -> Self {
        Self::filled(cols, Cell::blank())
    }

    fn filled(cols: usize, cell: Cell) -> Self {
        Self {
            cells: vec![cell; cols],
            wrapped: false,
        }
    }

    /// Truncate or pad to `cols`. A wide glyph cut in half becomes blank.
    fn resize(&mut self, cols: usize) {
        if cols < self.cells.len() {
            self.cells.truncate(cols);
            if let Some(last) = self.cells.last_mut() {
                if last.is_wide() {
                    *last = Cell::blank();
                }
            }
        } else {
            self.cells.resize(cols, Cell::blank());
        }
    }

    pub fn text(&self) -> String {
        weft_protocol::types::row_to_string(&self.cells)
    }

    fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| *c == Cell::blank())
    }
}

/// Colours and attributes applied to newly written cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pen {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attrs,
}

/// Terminal modes toggled by SM/RM and DECSET/DECRST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modes {
    pub autowrap: bool,
    pub insert: bool,
    pub origin: bool,
    pub linefeed_newline: bool,
    pub app_cursor: bool,
    pub app_keypad: bool,
    pub bracketed_paste: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            autowrap: true,
            insert: false,
            origin: false,
            linefeed_newline: false,
            app_cursor: false,
            app_keypad: false,
            bracketed_paste: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SavedCursor {
    row: usize,
    col: usize,
    pen: Pen,
    origin: bool,
    autowrap: bool,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    row: usize,
    col: usize,
    pending_wrap: bool,
    visible: bool,
    shape: CursorShape,
    blinking: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            row: 0,
            col: 0,
            pending_wrap: false,
            visible: true,
            shape: CursorShape::Block,
            blinking: false,
        }
    }
}

/// Virtual terminal screen
#[derive(Debug)]
pub struct Grid {
    cols: usize,
    rows: usize,
    primary: Vec<Row>,
    alternate: Vec<Row>,
    using_alternate: bool,
    allow_alternate: bool,
    scrollback: VecDeque<Row>,
    history_limit: usize,
    cursor: Cursor,
    saved_primary: SavedCursor,
    saved_alternate: SavedCursor,
    pen: Pen,
    modes: Modes,
    scroll_top: usize,
    scroll_bottom: usize,
    tabs: Vec<bool>,
    title: String,
    title_changed: bool,
    bell: bool,
    dirty: Vec<bool>,
    resized: bool,
    replies: Vec<u8>,
    parser: Parser,
}

impl Grid {
    /// Create a blank grid. Dimensions below 1 are raised to 1.
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = (cols as usize).max(1);
        let rows = (rows as usize).max(1);
        Self {
            cols,
            rows,
            primary: (0..rows).map(|_| Row::new(cols)).collect(),
            alternate: Vec::new(),
            using_alternate: false,
            allow_alternate: true,
            scrollback: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            cursor: Cursor::default(),
            saved_primary: SavedCursor {
                autowrap: true,
                ..SavedCursor::default()
            },
            saved_alternate: SavedCursor {
                autowrap: true,
                ..SavedCursor::default()
            },
            pen: Pen::default(),
            modes: Modes::default(),
            scroll_top: 0,
            scroll_bottom: rows - 1,
            tabs: default_tabs(cols),
            title: String::new(),
            title_changed: false,
            bell: false,
            dirty: vec![true; rows],
            resized: false,
            replies: Vec::new(),
            parser: Parser::new(),
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.set_history_limit(limit);
        self
    }

    // ==================== Accessors ====================

    pub fn cols(&self) -> u16 {
        self.cols as u16
    }

    pub fn rows(&self) -> u16 {
        self.rows as u16
    }

    pub fn cursor(&self) -> CursorState {
        CursorState {
            row: self.cursor.row as u16,
            col: self.cursor.col as u16,
            visible: self.cursor.visible,
            shape: self.cursor.shape,
            blinking: self.cursor.blinking,
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.screen().get(row).and_then(|r| r.cells.get(col))
    }

    pub fn row(&self, row: usize) -> Option<&Row> {
        self.screen().get(row)
    }

    #[cfg(test)]
    pub fn row_text(&self, row: usize) -> String {
        self.row(row).map(Row::text).unwrap_or_default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn pen(&self) -> Pen {
        self.pen
    }

    pub fn modes(&self) -> Modes {
        self.modes
    }

    #[cfg(test)]
    pub fn is_alternate(&self) -> bool {
        self.using_alternate
    }

    #[cfg(test)]
    pub fn scroll_region(&self) -> (usize, usize) {
        (self.scroll_top, self.scroll_bottom)
    }

    #[cfg(test)]
    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    /// Scrollback row `idx`, 0 being the oldest
    #[cfg(test)]
    pub fn scrollback_row(&self, idx: usize) -> Option<&Row> {
        self.scrollback.get(idx)
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn set_history_limit(&mut self, limit: usize) {
        self.history_limit = limit;
        while self.scrollback.len() > limit {
            self.scrollback.pop_front();
        }
    }

    /// Whether the alternate screen may be entered
    pub fn set_allow_alternate(&mut self, allow: bool) {
        self.allow_alternate = allow;
    }

    // ==================== Damage ====================

    /// Rows changed since the last [`Grid::clear_damage`]
    pub fn dirty_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.dirty
            .iter()
            .enumerate()
            .filter(|(_, d)| **d)
            .map(|(i, _)| i)
    }

    pub fn clear_damage(&mut self) {
        self.dirty.iter_mut().for_each(|d| *d = false);
        self.resized = false;
    }

    /// True once after a resize that changed dimensions
    pub fn was_resized(&self) -> bool {
        self.resized
    }

    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }

    pub fn take_title_change(&mut self) -> Option<String> {
        if std::mem::take(&mut self.title_changed) {
            Some(self.title.clone())
        } else {
            None
        }
    }

    /// Bytes the terminal must send back to the application (DSR, DA)
    pub fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.replies)
    }

    /// Full visible contents
    pub fn snapshot(&self, pane_id: PaneId, seq: u64) -> GridSnapshot {
        let screen = self.screen();
        GridSnapshot {
            pane_id,
            seq,
            cols: self.cols as u16,
            rows: self.rows as u16,
            cells: screen.iter().map(|r| r.cells.clone()).collect(),
            wrapped: screen.iter().map(|r| r.wrapped).collect(),
            cursor: self.cursor(),
            title: self.title.clone(),
        }
    }

    // ==================== Input ====================

    /// Interpret a chunk of pty output.
    pub fn process(&mut self, bytes: &[u8]) {
        let mut parser = std::mem::take(&mut self.parser);
        parser.feed(bytes, |action| self.apply(action));
        self.parser = parser;
    }

    /// End of stream: drop any partial escape sequence.
    pub fn finish(&mut self) {
        if self.parser.flush() {
            trace!("discarded partial escape sequence at end of stream");
        }
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::Print(ch) => self.print(ch),
            Action::Execute(byte) => self.execute(byte),
            Action::Csi(seq) => self.csi(&seq),
            Action::Esc {
                intermediates,
                final_byte,
            } => self.esc(&intermediates, final_byte),
            Action::Osc(payload) => self.osc(&payload),
        }
    }

    // ==================== Resize ====================

    /// Change the screen size. Visible rows are kept up to the smaller of
    /// the old and new sizes; scrollback is left untouched.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let cols = (cols as usize).max(1);
        let rows = (rows as usize).max(1);
        if cols == self.cols && rows == self.rows {
            return;
        }

        if rows < self.rows {
            self.shrink_rows(rows);
        } else if rows > self.rows {
            let grow = rows - self.rows;
            self.primary
                .extend((0..grow).map(|_| Row::new(self.cols)));
            if !self.alternate.is_empty() {
                self.alternate
                    .extend((0..grow).map(|_| Row::new(self.cols)));
            }
        }

        for row in self.primary.iter_mut().chain(self.alternate.iter_mut()) {
            row.resize(cols);
        }

        self.cols = cols;
        self.rows = rows;
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.tabs = default_tabs(cols);
        self.cursor.row = self.cursor.row.min(rows - 1);
        self.cursor.col = self.cursor.col.min(cols - 1);
        self.cursor.pending_wrap = false;
        for saved in [&mut self.saved_primary, &mut self.saved_alternate] {
            saved.row = saved.row.min(rows - 1);
            saved.col = saved.col.min(cols - 1);
        }
        self.dirty = vec![true; rows];
        self.resized = true;
    }

    fn shrink_rows(&mut self, rows: usize) {
        let mut excess = self.rows - rows;

        // Blank rows below the cursor go first
        while excess > 0 {
            let last = self.active_screen().len() - 1;
            if last <= self.cursor.row || !self.active_screen()[last].is_blank() {
                break;
            }
            self.active_screen_mut().pop();
            excess -= 1;
        }

        // Then rows above the cursor scroll off the top
        let from_top = excess.min(self.cursor.row);
        for _ in 0..from_top {
            let row = self.active_screen_mut().remove(0);
            if !self.using_alternate {
                self.push_scrollback(row);
            }
        }
        self.cursor.row -= from_top;

        // Whatever is left is cut from the bottom
        self.active_screen_mut().truncate(rows);

        if self.using_alternate {
            drain_front_to(&mut self.primary, rows, &mut self.scrollback, self.history_limit);
        } else {
            self.alternate.truncate(rows);
        }
    }

    // ==================== Screen helpers ====================

    fn screen(&self) -> &Vec<Row> {
        if self.using_alternate {
            &self.alternate
        } else {
            &self.primary
        }
    }

    fn active_screen(&self) -> &Vec<Row> {
        self.screen()
    }

    fn active_screen_mut(&mut self) -> &mut Vec<Row> {
        if self.using_alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    fn mark_dirty(&mut self, row: usize) {
        if let Some(d) = self.dirty.get_mut(row) {
            *d = true;
        }
    }

    fn mark_range_dirty(&mut self, start: usize, end_inclusive: usize) {
        for row in start..=end_inclusive.min(self.rows - 1) {
            self.mark_dirty(row);
        }
    }

    fn mark_all_dirty(&mut self) {
        self.dirty.iter_mut().for_each(|d| *d = true);
    }

    fn erased_cell(&self) -> Cell {
        Cell::erased(self.pen.bg)
    }

    fn blank_row(&self) -> Row {
        Row::filled(self.cols, self.erased_cell())
    }

    fn push_scrollback(&mut self, row: Row) {
        if self.history_limit == 0 {
            return;
        }
        if self.scrollback.len() >= self.history_limit {
            self.scrollback.pop_front();
        }
        self.scrollback.push_back(row);
    }

    /// Clear both halves of any wide glyph overlapping `col`.
    fn split_wide_at(&mut self, row: usize, col: usize) {
        let cols = self.cols;
        let cells = &mut self.active_screen_mut()[row].cells;
        if col >= cols {
            return;
        }
        if cells[col].is_continuation() {
            if col > 0 {
                cells[col - 1] = Cell::blank();
            }
            cells[col] = Cell::blank();
        } else if cells[col].is_wide() {
            if col + 1 < cols {
                cells[col + 1] = Cell::blank();
            }
            cells[col] = Cell::blank();
        }
    }

    /// Erase `[start, end)` on `row` with the current background.
    fn erase_cells(&mut self, row: usize, start: usize, end: usize) {
        let end = end.min(self.cols);
        if start >= end {
            return;
        }
        self.split_wide_at(row, start);
        self.split_wide_at(row, end - 1);
        let blank = self.erased_cell();
        for cell in &mut self.active_screen_mut()[row].cells[start..end] {
            *cell = blank;
        }
        self.mark_dirty(row);
    }

    fn erase_rows(&mut self, start: usize, end: usize) {
        let blank = self.blank_row();
        for row in start..end.min(self.rows) {
            self.active_screen_mut()[row] = blank.clone();
            self.mark_dirty(row);
        }
    }

    // ==================== Printing ====================

    fn print(&mut self, ch: char) {
        let width = ch.width().unwrap_or(0);
        if width == 0 {
            return;
        }

        if self.cursor.pending_wrap && self.modes.autowrap {
            self.wrap_line();
        }
        self.cursor.pending_wrap = false;

        if width == 2 && self.cursor.col + 1 >= self.cols {
            if !self.modes.autowrap || self.cols < 2 {
                return;
            }
            // Wide glyphs never start in the last column
            let (row, col) = (self.cursor.row, self.cursor.col);
            self.erase_cells(row, col, col + 1);
            self.wrap_line();
        }

        let (row, col) = (self.cursor.row, self.cursor.col);
        if self.modes.insert {
            self.insert_blanks(row, col, width);
        }

        self.split_wide_at(row, col);
        if width == 2 {
            self.split_wide_at(row, col + 1);
        }

        let pen = self.pen;
        let cells = &mut self.active_screen_mut()[row].cells;
        cells[col] = Cell {
            ch,
            width: width as u8,
            fg: pen.fg,
            bg: pen.bg,
            attrs: pen.attrs,
        };
        if width == 2 {
            cells[col + 1] = Cell::continuation(pen.fg, pen.bg, pen.attrs);
        }
        self.mark_dirty(row);

        let next = col + width;
        if next >= self.cols {
            self.cursor.col = self.cols - 1;
            self.cursor.pending_wrap = self.modes.autowrap;
        } else {
            self.cursor.col = next;
        }
    }

    fn wrap_line(&mut self) {
        let row = self.cursor.row;
        self.active_screen_mut()[row].wrapped = true;
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
        self.index();
    }

    // ==================== Controls ====================

    fn execute(&mut self, byte: u8) {
        match byte {
            0x07 => self.bell = true,
            0x08 => {
                self.cursor.pending_wrap = false;
                self.cursor.col = self.cursor.col.saturating_sub(1);
            }
            0x09 => self.tab_forward(1),
            0x0a..=0x0c => {
                if self.modes.linefeed_newline {
                    self.cursor.col = 0;
                }
                self.index();
            }
            0x0d => {
                self.cursor.pending_wrap = false;
                self.cursor.col = 0;
            }
            _ => {}
        }
    }

    /// Move down one row, scrolling the region at its bottom margin.
    fn index(&mut self) {
        self.cursor.pending_wrap = false;
        if self.cursor.row == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows {
            self.cursor.row += 1;
        }
    }

    fn reverse_index(&mut self) {
        self.cursor.pending_wrap = false;
        if self.cursor.row == self.scroll_top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
    }

    /// Scroll the region up; rows leaving the top of a full-height region
    /// on the primary screen go to scrollback.
    fn scroll_up(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let n = n.min(bottom - top + 1);
        let keep = !self.using_alternate && top == 0;
        for _ in 0..n {
            let blank = self.blank_row();
            let screen = self.active_screen_mut();
            let row = screen.remove(top);
            screen.insert(bottom, blank);
            if keep {
                self.push_scrollback(row);
            }
        }
        self.mark_range_dirty(top, bottom);
    }

    fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let n = n.min(bottom - top + 1);
        for _ in 0..n {
            let blank = self.blank_row();
            let screen = self.active_screen_mut();
            screen.remove(bottom);
            screen.insert(top, blank);
        }
        self.mark_range_dirty(top, bottom);
    }

    fn tab_forward(&mut self, n: usize) {
        self.cursor.pending_wrap = false;
        for _ in 0..n {
            let next = (self.cursor.col + 1..self.cols).find(|&c| self.tabs[c]);
            self.cursor.col = next.unwrap_or(self.cols - 1);
        }
    }

    fn tab_backward(&mut self, n: usize) {
        self.cursor.pending_wrap = false;
        for _ in 0..n {
            let prev = (0..self.cursor.col).rev().find(|&c| self.tabs[c]);
            self.cursor.col = prev.unwrap_or(0);
        }
    }

    // ==================== Cursor movement ====================

    fn move_to(&mut self, row: usize, col: usize) {
        let (min_row, max_row) = if self.modes.origin {
            (self.scroll_top, self.scroll_bottom)
        } else {
            (0, self.rows - 1)
        };
        let row = if self.modes.origin { row + self.scroll_top } else { row };
        self.cursor.row = row.clamp(min_row, max_row);
        self.cursor.col = col.min(self.cols - 1);
        self.cursor.pending_wrap = false;
    }

    fn cursor_up(&mut self, n: usize) {
        let floor = if self.cursor.row >= self.scroll_top {
            self.scroll_top
        } else {
            0
        };
        self.cursor.row = self.cursor.row.saturating_sub(n).max(floor);
        self.cursor.pending_wrap = false;
    }

    fn cursor_down(&mut self, n: usize) {
        let ceiling = if self.cursor.row <= self.scroll_bottom {
            self.scroll_bottom
        } else {
            self.rows - 1
        };
        self.cursor.row = (self.cursor.row + n).min(ceiling);
        self.cursor.pending_wrap = false;
    }

    fn cursor_right(&mut self, n: usize) {
        self.cursor.col = (self.cursor.col + n).min(self.cols - 1);
        self.cursor.pending_wrap = false;
    }

    fn cursor_left(&mut self, n: usize) {
        self.cursor.col = self.cursor.col.saturating_sub(n);
        self.cursor.pending_wrap = false;
    }

    fn save_cursor(&mut self) {
        let saved = SavedCursor {
            row: self.cursor.row,
            col: self.cursor.col,
            pen: self.pen,
            origin: self.modes.origin,
            autowrap: self.modes.autowrap,
        };
        if self.using_alternate {
            self.saved_alternate = saved;
        } else {
            self.saved_primary = saved;
        }
    }

    fn restore_cursor(&mut self) {
        let saved = if self.using_alternate {
            self.saved_alternate
        } else {
            self.saved_primary
        };
        self.cursor.row = saved.row.min(self.rows - 1);
        self.cursor.col = saved.col.min(self.cols - 1);
        self.cursor.pending_wrap = false;
        self.pen = saved.pen;
        self.modes.origin = saved.origin;
        self.modes.autowrap = saved.autowrap;
        if self.modes.origin {
            self.cursor.row = self.cursor.row.clamp(self.scroll_top, self.scroll_bottom);
        }
    }

    // ==================== Editing ====================

    fn insert_blanks(&mut self, row: usize, col: usize, n: usize) {
        let cols = self.cols;
        let n = n.min(cols - col);
        self.split_wide_at(row, col);
        // The glyph about to be pushed off the end may be wide
        if cols > n {
            self.split_wide_at(row, cols - n - 1);
        }
        let blank = self.erased_cell();
        let cells = &mut self.active_screen_mut()[row].cells;
        cells.truncate(cols - n);
        for _ in 0..n {
            cells.insert(col, blank);
        }
        self.mark_dirty(row);
    }

    fn delete_chars(&mut self, row: usize, col: usize, n: usize) {
        let cols = self.cols;
        let n = n.min(cols - col);
        self.split_wide_at(row, col);
        if col + n < cols {
            self.split_wide_at(row, col + n);
        }
        let blank = self.erased_cell();
        let cells = &mut self.active_screen_mut()[row].cells;
        cells.drain(col..col + n);
        cells.extend(std::iter::repeat(blank).take(n));
        self.mark_dirty(row);
    }

    fn insert_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let bottom = self.scroll_bottom;
        let n = n.min(bottom - row + 1);
        for _ in 0..n {
            let blank = self.blank_row();
            let screen = self.active_screen_mut();
            screen.remove(bottom);
            screen.insert(row, blank);
        }
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
        self.mark_range_dirty(row, bottom);
    }

    fn delete_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let bottom = self.scroll_bottom;
        let n = n.min(bottom - row + 1);
        for _ in 0..n {
            let blank = self.blank_row();
            let screen = self.active_screen_mut();
            screen.remove(row);
            screen.insert(bottom, blank);
        }
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
        self.mark_range_dirty(row, bottom);
    }

    fn erase_in_display(&mut self, mode: u16) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        match mode {
            0 => {
                self.erase_cells(row, col, self.cols);
                self.erase_rows(row + 1, self.rows);
            }
            1 => {
                self.erase_rows(0, row);
                self.erase_cells(row, 0, col + 1);
            }
            2 => self.erase_rows(0, self.rows),
            3 => self.scrollback.clear(),
            _ => {}
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        match mode {
            0 => self.erase_cells(row, col, self.cols),
            1 => self.erase_cells(row, 0, col + 1),
            2 => self.erase_cells(row, 0, self.cols),
            _ => {}
        }
        if mode <= 2 {
            self.active_screen_mut()[row].wrapped = false;
        }
    }

    fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let top = (top.max(1) as usize) - 1;
        let bottom = if bottom == 0 {
            self.rows - 1
        } else {
            (bottom as usize - 1).min(self.rows - 1)
        };
        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
            self.move_to(0, 0);
        }
    }

    fn set_alternate(&mut self, enable: bool, save_cursor: bool, clear_on_exit: bool) {
        if !self.allow_alternate || enable == self.using_alternate {
            return;
        }
        if enable {
            if save_cursor {
                self.save_cursor();
            }
            if save_cursor || self.alternate.len() != self.rows {
                self.alternate = (0..self.rows).map(|_| Row::new(self.cols)).collect();
            }
            self.using_alternate = true;
        } else {
            if clear_on_exit || save_cursor {
                self.alternate.clear();
            }
            self.using_alternate = false;
            if save_cursor {
                self.restore_cursor();
            }
        }
        self.cursor.pending_wrap = false;
        self.mark_all_dirty();
    }

    fn reset(&mut self) {
        let (cols, rows) = (self.cols, self.rows);
        let scrollback = std::mem::take(&mut self.scrollback);
        let history_limit = self.history_limit;
        let allow_alternate = self.allow_alternate;
        let parser = std::mem::take(&mut self.parser);
        *self = Grid::new(cols as u16, rows as u16);
        self.scrollback = scrollback;
        self.history_limit = history_limit;
        self.allow_alternate = allow_alternate;
        self.parser = parser;
        self.title_changed = true;
    }

    fn fill_alignment(&mut self) {
        let e = Cell {
            ch: 'E',
            ..Cell::blank()
        };
        let cols = self.cols;
        for row in self.active_screen_mut().iter_mut() {
            *row = Row::filled(cols, e);
        }
        self.move_to(0, 0);
        self.mark_all_dirty();
    }

    // ==================== Escape dispatch ====================

    fn esc(&mut self, intermediates: &[u8], final_byte: u8) {
        match (intermediates, final_byte) {
            ([], b'7') => self.save_cursor(),
            ([], b'8') => self.restore_cursor(),
            ([], b'D') => self.index(),
            ([], b'E') => {
                self.cursor.col = 0;
                self.index();
            }
            ([], b'M') => self.reverse_index(),
            ([], b'H') => self.tabs[self.cursor.col] = true,
            ([], b'c') => self.reset(),
            ([], b'=') => self.modes.app_keypad = true,
            ([], b'>') => self.modes.app_keypad = false,
            ([b'#'], b'8') => self.fill_alignment(),
            // Character set designation is accepted and ignored
            ([b'('], _) | ([b')'], _) | ([b'*'], _) | ([b'+'], _) => {}
            _ => trace!(?intermediates, final_byte, "unhandled ESC"),
        }
    }

    fn csi(&mut self, seq: &CsiSequence) {
        match (seq.private, seq.intermediates.as_slice(), seq.final_byte) {
            (None, [], b'@') => {
                let (row, col) = (self.cursor.row, self.cursor.col);
                self.insert_blanks(row, col, seq.param_or(0, 1) as usize);
            }
            (None, [], b'A') => self.cursor_up(seq.param_or(0, 1) as usize),
            (None, [], b'B') | (None, [], b'e') => self.cursor_down(seq.param_or(0, 1) as usize),
            (None, [], b'C') | (None, [], b'a') => self.cursor_right(seq.param_or(0, 1) as usize),
            (None, [], b'D') => self.cursor_left(seq.param_or(0, 1) as usize),
            (None, [], b'E') => {
                self.cursor_down(seq.param_or(0, 1) as usize);
                self.cursor.col = 0;
            }
            (None, [], b'F') => {
                self.cursor_up(seq.param_or(0, 1) as usize);
                self.cursor.col = 0;
            }
            (None, [], b'G') | (None, [], b'`') => {
                self.cursor.col = (seq.param_or(0, 1) as usize - 1).min(self.cols - 1);
                self.cursor.pending_wrap = false;
            }
            (None, [], b'H') | (None, [], b'f') => {
                let row = seq.param_or(0, 1) as usize - 1;
                let col = seq.param_or(1, 1) as usize - 1;
                self.move_to(row, col);
            }
            (None, [], b'I') => self.tab_forward(seq.param_or(0, 1) as usize),
            (None, [], b'Z') => self.tab_backward(seq.param_or(0, 1) as usize),
            (None, [], b'J') => self.erase_in_display(seq.raw(0)),
            (None, [], b'K') => self.erase_in_line(seq.raw(0)),
            (None, [], b'L') => self.insert_lines(seq.param_or(0, 1) as usize),
            (None, [], b'M') => self.delete_lines(seq.param_or(0, 1) as usize),
            (None, [], b'P') => {
                let (row, col) = (self.cursor.row, self.cursor.col);
                self.delete_chars(row, col, seq.param_or(0, 1) as usize);
            }
            (None, [], b'S') => self.scroll_up(seq.param_or(0, 1) as usize),
            (None, [], b'T') => self.scroll_down(seq.param_or(0, 1) as usize),
            (None, [], b'X') => {
                let (row, col) = (self.cursor.row, self.cursor.col);
                let n = seq.param_or(0, 1) as usize;
                self.erase_cells(row, col, col + n);
            }
            (None, [], b'b') => {
                // REP repeats the previous glyph
                let (row, col) = (self.cursor.row, self.cursor.col);
                let prev = if col > 0 {
                    self.cell(row, col - 1).map(|c| c.ch)
                } else {
                    None
                };
                if let Some(ch) = prev {
                    let n = (seq.param_or(0, 1) as usize).min(self.cols * self.rows);
                    for _ in 0..n {
                        self.print(ch);
                    }
                }
            }
            (None, [], b'd') => {
                let row = seq.param_or(0, 1) as usize - 1;
                let col = self.cursor.col;
                self.move_to(row, col);
            }
            (None, [], b'g') => match seq.raw(0) {
                0 => self.tabs[self.cursor.col] = false,
                3 => self.tabs.iter_mut().for_each(|t| *t = false),
                _ => {}
            },
            (None, [], b'h') => self.set_ansi_modes(&seq.params, true),
            (None, [], b'l') => self.set_ansi_modes(&seq.params, false),
            (Some(b'?'), [], b'h') => self.set_dec_modes(&seq.params, true),
            (Some(b'?'), [], b'l') => self.set_dec_modes(&seq.params, false),
            (None, [], b'm') => self.sgr(&seq.params),
            (None, [], b'n') => match seq.raw(0) {
                5 => self.replies.extend_from_slice(b"\x1b[0n"),
                6 => {
                    let row = if self.modes.origin {
                        self.cursor.row.saturating_sub(self.scroll_top)
                    } else {
                        self.cursor.row
                    };
                    let reply = format!("\x1b[{};{}R", row + 1, self.cursor.col + 1);
                    self.replies.extend_from_slice(reply.as_bytes());
                }
                _ => {}
            },
            (None, [], b'c') => {
                if seq.raw(0) == 0 {
                    self.replies.extend_from_slice(b"\x1b[?1;2c");
                }
            }
            (Some(b'>'), [], b'c') => self.replies.extend_from_slice(b"\x1b[>84;0;0c"),
            (None, [], b'r') => {
                let bottom = seq.raw(1);
                self.set_scroll_region(seq.raw(0), bottom);
            }
            (None, [], b's') => self.save_cursor(),
            (None, [], b'u') => self.restore_cursor(),
            (None, [b' '], b'q') => {
                let style = seq.raw(0);
                self.cursor.shape = match style {
                    0..=2 => CursorShape::Block,
                    3 | 4 => CursorShape::Underline,
                    _ => CursorShape::Bar,
                };
                self.cursor.blinking = style == 0 || style % 2 == 1;
            }
            _ => trace!(?seq, "unhandled CSI"),
        }
    }

    fn set_ansi_modes(&mut self, params: &[u16], enable: bool) {
        for &mode in params {
            match mode {
                4 => self.modes.insert = enable,
                20 => self.modes.linefeed_newline = enable,
                _ => trace!(mode, "unhandled mode"),
            }
        }
    }

    fn set_dec_modes(&mut self, params: &[u16], enable: bool) {
        for &mode in params {
            match mode {
                1 => self.modes.app_cursor = enable,
                6 => {
                    self.modes.origin = enable;
                    self.move_to(0, 0);
                }
                7 => {
                    self.modes.autowrap = enable;
                    if !enable {
                        self.cursor.pending_wrap = false;
                    }
                }
                12 => self.cursor.blinking = enable,
                25 => self.cursor.visible = enable,
                47 => self.set_alternate(enable, false, false),
                1047 => self.set_alternate(enable, false, true),
                1048 => {
                    if enable {
                        self.save_cursor();
                    } else {
                        self.restore_cursor();
                    }
                }
                1049 => self.set_alternate(enable, true, true),
                2004 => self.modes.bracketed_paste = enable,
                _ => trace!(mode, "unhandled private mode"),
            }
        }
    }

    fn sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.pen = Pen::default();
            return;
        }

        let mut iter = params.iter().copied();
        while let Some(param) = iter.next() {
            match param {
                0 => self.pen = Pen::default(),
                1 => self.pen.attrs |= Attrs::BOLD,
                2 => self.pen.attrs |= Attrs::DIM,
                3 => self.pen.attrs |= Attrs::ITALIC,
                4 | 21 => self.pen.attrs |= Attrs::UNDERLINE,
                5 | 6 => self.pen.attrs |= Attrs::BLINK,
                7 => self.pen.attrs |= Attrs::REVERSE,
                8 => self.pen.attrs |= Attrs::HIDDEN,
                9 => self.pen.attrs |= Attrs::STRIKETHROUGH,
                22 => self.pen.attrs.remove(Attrs::BOLD | Attrs::DIM),
                23 => self.pen.attrs.remove(Attrs::ITALIC),
                24 => self.pen.attrs.remove(Attrs::UNDERLINE),
                25 => self.pen.attrs.remove(Attrs::BLINK),
                27 => self.pen.attrs.remove(Attrs::REVERSE),
                28 => self.pen.attrs.remove(Attrs::HIDDEN),
                29 => self.pen.attrs.remove(Attrs::STRIKETHROUGH),
                30..=37 => self.pen.fg = Color::Indexed((param - 30) as u8),
                38 => {
                    if let Some(color) = extended_color(&mut iter) {
                        self.pen.fg = color;
                    }
                }
                39 => self.pen.fg = Color::Default,
                40..=47 => self.pen.bg = Color::Indexed((param - 40) as u8),
                48 => {
                    if let Some(color) = extended_color(&mut iter) {
                        self.pen.bg = color;
                    }
                }
                49 => self.pen.bg = Color::Default,
                90..=97 => self.pen.fg = Color::Indexed((param - 90 + 8) as u8),
                100..=107 => self.pen.bg = Color::Indexed((param - 100 + 8) as u8),
                _ => {}
            }
        }
    }

    fn osc(&mut self, payload: &[u8]) {
        let text = String::from_utf8_lossy(payload);
        let Some((code, value)) = text.split_once(';') else {
            return;
        };
        match code {
            "0" | "1" | "2" => {
                let title: String = value.chars().filter(|c| !c.is_control()).collect();
                if title != self.title {
                    self.title = title;
                    self.title_changed = true;
                }
            }
            _ => trace!(code, "unhandled OSC"),
        }
    }
}

/// `38;5;n` and `38;2;r;g;b` colour forms
fn extended_color<I: Iterator<Item = u16>>(iter: &mut I) -> Option<Color> {
    match iter.next()? {
        5 => iter.next().map(|n| Color::Indexed(n.min(255) as u8)),
        2 => {
            let r = iter.next().unwrap_or(0).min(255) as u8;
            let g = iter.next().unwrap_or(0).min(255) as u8;
            let b = iter.next().unwrap_or(0).min(255) as u8;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

fn default_tabs(cols: usize) -> Vec<bool> {
    (0..cols).map(|c| c > 0 && c % TAB_WIDTH == 0).collect()
}

/// Drop rows from the top of `screen` until it has `rows` rows, keeping
/// them in scrollback.
fn drain_front_to(
    screen: &mut Vec<Row>,
    rows: usize,
    scrollback: &mut VecDeque<Row>,
    limit: usize,
) {
    while screen.len() > rows {
        let row = screen.remove(0);
        if limit > 0 {
            if scrollback.len() >= limit {
                scrollback.pop_front();
            }
            scrollback.push_back(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(cols: u16, rows: u16, input: &str) -> Grid {
        let mut grid = Grid::new(cols, rows);
        grid.process(input.as_bytes());
        grid
    }

    fn lines(n: usize) -> String {
        (0..n).map(|i| format!("l{}", i)).collect::<Vec<_>>().join("\r\n")
    }

    // ==================== Printing Tests ====================

    #[test]
    fn test_print_advances_cursor() {
        let grid = grid_with(80, 24, "hello");
        assert_eq!(grid.row_text(0), "hello");
        assert_eq!(grid.cursor().row, 0);
        assert_eq!(grid.cursor().col, 5);
    }

    #[test]
    fn test_full_row_wraps_on_next_glyph() {
        let mut grid = grid_with(5, 3, "abcde");
        assert_eq!(grid.cursor().col, 4);
        assert_eq!(grid.cursor().row, 0);

        grid.process(b"f");
        assert_eq!(grid.row_text(0), "abcde");
        assert_eq!(grid.row_text(1), "f");
        assert!(grid.row(0).unwrap().wrapped);
        assert_eq!((grid.cursor().row, grid.cursor().col), (1, 1));
    }

    #[test]
    fn test_crlf_after_full_row_does_not_wrap() {
        let grid = grid_with(5, 3, "abcde\r\n");
        assert_eq!((grid.cursor().row, grid.cursor().col), (1, 0));
        assert!(!grid.row(0).unwrap().wrapped);
    }

    #[test]
    fn test_autowrap_off_overwrites_last_column() {
        let grid = grid_with(5, 2, "\x1b[?7labcdefg");
        assert_eq!(grid.row_text(0), "abcdg");
        assert_eq!(grid.row_text(1), "");
        assert_eq!(grid.cursor().col, 4);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut grid = Grid::new(10, 2);
        grid.process(&[0xe4, 0xb8]);
        grid.process(&[0xad]);
        assert_eq!(grid.cell(0, 0).unwrap().ch, '中');
    }

    #[test]
    fn test_tab_moves_to_next_stop() {
        let grid = grid_with(20, 2, "\tx");
        assert_eq!(grid.cell(0, 8).unwrap().ch, 'x');
    }

    // ==================== Wide Glyph Tests ====================

    #[test]
    fn test_wide_glyph_takes_two_cells() {
        let grid = grid_with(10, 2, "中x");
        assert!(grid.cell(0, 0).unwrap().is_wide());
        assert!(grid.cell(0, 1).unwrap().is_continuation());
        assert_eq!(grid.cell(0, 2).unwrap().ch, 'x');
        assert_eq!(grid.cursor().col, 3);
    }

    #[test]
    fn test_wide_glyph_wraps_from_last_column() {
        let grid = grid_with(3, 2, "ab中");
        assert_eq!(grid.row_text(0), "ab");
        assert!(grid.row(0).unwrap().wrapped);
        assert_eq!(grid.cell(1, 0).unwrap().ch, '中');
        assert_eq!((grid.cursor().row, grid.cursor().col), (1, 2));
    }

    #[test]
    fn test_overwriting_half_of_wide_glyph_clears_it() {
        let grid = grid_with(10, 1, "中\x1b[1;2Hx");
        assert_eq!(grid.row_text(0), " x");
        assert!(!grid.cell(0, 0).unwrap().is_wide());
    }

    // ==================== Cursor Tests ====================

    #[test]
    fn test_cup_is_clamped() {
        let mut grid = grid_with(80, 24, "\x1b[999;999H");
        assert_eq!((grid.cursor().row, grid.cursor().col), (23, 79));

        grid.process(b"\x1b[0;0H");
        assert_eq!((grid.cursor().row, grid.cursor().col), (0, 0));
    }

    #[test]
    fn test_relative_moves_clamp() {
        let grid = grid_with(10, 5, "\x1b[3;3H\x1b[20A\x1b[20D");
        assert_eq!((grid.cursor().row, grid.cursor().col), (0, 0));
    }

    #[test]
    fn test_cursor_visibility_and_shape() {
        let mut grid = grid_with(10, 2, "\x1b[?25l\x1b[6 q");
        assert!(!grid.cursor().visible);
        assert_eq!(grid.cursor().shape, CursorShape::Bar);
        assert!(!grid.cursor().blinking);

        grid.process(b"\x1b[?25h\x1b[3 q");
        assert!(grid.cursor().visible);
        assert_eq!(grid.cursor().shape, CursorShape::Underline);
        assert!(grid.cursor().blinking);
    }

    #[test]
    fn test_save_restore_cursor() {
        let grid = grid_with(10, 5, "\x1b[2;3H\x1b7\x1b[5;5H\x1b8x");
        assert_eq!(grid.cell(1, 2).unwrap().ch, 'x');
    }

    // ==================== Erase Tests ====================

    #[test]
    fn test_erase_line_to_end() {
        let grid = grid_with(10, 1, "abcdef\x1b[1;3H\x1b[K");
        assert_eq!(grid.row_text(0), "ab");
    }

    #[test]
    fn test_erase_line_to_start() {
        let grid = grid_with(10, 1, "abcdef\x1b[1;3H\x1b[1K");
        assert_eq!(grid.row_text(0), "   def");
    }

    #[test]
    fn test_erase_display_below() {
        let grid = grid_with(10, 3, "aaa\r\nbbb\r\nccc\x1b[2;2H\x1b[J");
        assert_eq!(grid.row_text(0), "aaa");
        assert_eq!(grid.row_text(1), "b");
        assert_eq!(grid.row_text(2), "");
    }

    #[test]
    fn test_erase_uses_pen_background() {
        let grid = grid_with(4, 1, "\x1b[44m\x1b[2K");
        assert_eq!(grid.cell(0, 3).unwrap().bg, Color::Indexed(4));
    }

    #[test]
    fn test_erase_characters() {
        let grid = grid_with(10, 1, "abcdef\x1b[1;2H\x1b[2X");
        assert_eq!(grid.row_text(0), "a  def");
    }

    // ==================== Editing Tests ====================

    #[test]
    fn test_insert_and_delete_chars() {
        let mut grid = grid_with(10, 1, "abcd\x1b[1;2H\x1b[2@");
        assert_eq!(grid.row_text(0), "a  bcd");

        grid.process(b"\x1b[2P");
        assert_eq!(grid.row_text(0), "abcd");
    }

    #[test]
    fn test_insert_and_delete_lines() {
        let mut grid = grid_with(10, 3, "a\r\nb\r\nc\x1b[2;1H\x1b[L");
        assert_eq!(grid.row_text(0), "a");
        assert_eq!(grid.row_text(1), "");
        assert_eq!(grid.row_text(2), "b");

        grid.process(b"\x1b[M");
        assert_eq!(grid.row_text(1), "b");
        assert_eq!(grid.row_text(2), "");
    }

    #[test]
    fn test_insert_mode_shifts_text() {
        let grid = grid_with(10, 1, "abc\x1b[1;1H\x1b[4hX");
        assert_eq!(grid.row_text(0), "Xabc");
    }

    // ==================== Scrolling Tests ====================

    #[test]
    fn test_scrollback_collects_rows() {
        let grid = grid_with(10, 5, &lines(10));
        assert_eq!(grid.scrollback_len(), 5);
        assert_eq!(grid.scrollback_row(0).unwrap().text(), "l0");
        assert_eq!(grid.row_text(0), "l5");
        assert_eq!(grid.row_text(4), "l9");
    }

    #[test]
    fn test_history_limit_bounds_scrollback() {
        let mut grid = Grid::new(10, 5).with_history_limit(3);
        grid.process(lines(10).as_bytes());
        assert_eq!(grid.scrollback_len(), 3);
        assert_eq!(grid.scrollback_row(0).unwrap().text(), "l2");

        grid.set_history_limit(1);
        assert_eq!(grid.scrollback_len(), 1);
        assert_eq!(grid.scrollback_row(0).unwrap().text(), "l4");
    }

    #[test]
    fn test_scroll_region_confines_scrolling() {
        let mut grid = grid_with(10, 5, "1\r\n2\r\n3\r\n4\r\n5\x1b[2;4r");
        assert_eq!(grid.scroll_region(), (1, 3));
        assert_eq!((grid.cursor().row, grid.cursor().col), (0, 0));

        grid.process(b"\x1b[4;1H\n");
        assert_eq!(grid.row_text(0), "1");
        assert_eq!(grid.row_text(1), "3");
        assert_eq!(grid.row_text(2), "4");
        assert_eq!(grid.row_text(3), "");
        assert_eq!(grid.row_text(4), "5");
        assert_eq!(grid.scrollback_len(), 0);
    }

    #[test]
    fn test_reverse_index_at_top_scrolls_down() {
        let grid = grid_with(10, 3, "a\x1b[1;1H\x1bM");
        assert_eq!(grid.row_text(0), "");
        assert_eq!(grid.row_text(1), "a");
    }

    // ==================== Alternate Screen Tests ====================

    #[test]
    fn test_alternate_screen_round_trip() {
        let mut grid = grid_with(10, 3, "main\x1b[?1049h");
        assert!(grid.is_alternate());
        assert_eq!(grid.row_text(0), "");

        grid.process(b"x\r\nx\r\nx\r\nx\r\nx");
        assert_eq!(grid.scrollback_len(), 0);

        grid.process(b"\x1b[?1049l");
        assert!(!grid.is_alternate());
        assert_eq!(grid.row_text(0), "main");
        assert_eq!(grid.cursor().col, 4);
    }

    #[test]
    fn test_alternate_screen_can_be_disabled() {
        let mut grid = Grid::new(10, 3);
        grid.set_allow_alternate(false);
        grid.process(b"main\x1b[?1049h");
        assert!(!grid.is_alternate());
        assert_eq!(grid.row_text(0), "main");
    }

    // ==================== SGR Tests ====================

    #[test]
    fn test_sgr_basic() {
        let grid = grid_with(10, 1, "\x1b[1;31mX\x1b[0mY");
        let x = grid.cell(0, 0).unwrap();
        assert!(x.attrs.contains(Attrs::BOLD));
        assert_eq!(x.fg, Color::Indexed(1));

        let y = grid.cell(0, 1).unwrap();
        assert_eq!(y.fg, Color::Default);
        assert!(y.attrs.is_empty());
    }

    #[test]
    fn test_sgr_extended_colors() {
        let grid = grid_with(10, 1, "\x1b[38;2;10;20;30;48;5;200mZ");
        let z = grid.cell(0, 0).unwrap();
        assert_eq!(z.fg, Color::Rgb(10, 20, 30));
        assert_eq!(z.bg, Color::Indexed(200));
    }

    #[test]
    fn test_sgr_bright_colors() {
        let grid = grid_with(10, 1, "\x1b[91;104mZ");
        let z = grid.cell(0, 0).unwrap();
        assert_eq!(z.fg, Color::Indexed(9));
        assert_eq!(z.bg, Color::Indexed(12));
    }

    // ==================== Reply Tests ====================

    #[test]
    fn test_cursor_position_report() {
        let mut grid = grid_with(10, 5, "\x1b[3;4H\x1b[6n");
        assert_eq!(grid.take_replies(), b"\x1b[3;4R");
        assert!(grid.take_replies().is_empty());
    }

    #[test]
    fn test_cursor_report_after_restore_into_origin_region() {
        let mut grid = grid_with(20, 12, "\x1b[?6h\x1b7\x1b[5;10r\x1b8\x1b[6n");
        assert_eq!(grid.take_replies(), b"\x1b[1;1R");
        assert_eq!(grid.cursor().row, 4);
    }

    #[test]
    fn test_device_attributes() {
        let mut grid = grid_with(10, 5, "\x1b[c");
        assert_eq!(grid.take_replies(), b"\x1b[?1;2c");
    }

    #[test]
    fn test_title_and_bell() {
        let mut grid = grid_with(10, 1, "\x1b]2;build\x07\x07");
        assert_eq!(grid.take_title_change(), Some("build".to_string()));
        assert_eq!(grid.take_title_change(), None);
        assert_eq!(grid.title(), "build");
        assert!(grid.take_bell());
        assert!(!grid.take_bell());
    }

    #[test]
    fn test_reset_keeps_scrollback() {
        let grid = grid_with(10, 2, "1\r\n2\r\n3\x1bc");
        assert_eq!(grid.scrollback_len(), 1);
        assert_eq!(grid.row_text(0), "");
        assert_eq!((grid.cursor().row, grid.cursor().col), (0, 0));
    }

    // ==================== Resize Tests ====================

    #[test]
    fn test_noop_resize_changes_nothing() {
        let mut grid = grid_with(80, 24, "hello");
        grid.clear_damage();
        grid.resize(80, 24);
        assert!(!grid.was_resized());
        assert_eq!(grid.dirty_rows().count(), 0);
        assert_eq!(grid.row_text(0), "hello");
        assert_eq!(grid.cursor().col, 5);
    }

    #[test]
    fn test_shrink_pushes_rows_above_cursor() {
        let mut grid = grid_with(10, 5, "a\r\nb\r\nc\r\nd\r\ne");
        grid.resize(10, 3);
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.scrollback_len(), 2);
        assert_eq!(grid.row_text(0), "c");
        assert_eq!(grid.row_text(2), "e");
        assert_eq!(grid.cursor().row, 2);
    }

    #[test]
    fn test_shrink_drops_blank_rows_below_cursor() {
        let mut grid = grid_with(10, 5, "a\r\nb");
        grid.resize(10, 3);
        assert_eq!(grid.scrollback_len(), 0);
        assert_eq!(grid.row_text(0), "a");
        assert_eq!(grid.row_text(1), "b");
        assert_eq!(grid.cursor().row, 1);
    }

    #[test]
    fn test_narrowing_blanks_cut_wide_glyph() {
        let mut grid = grid_with(4, 2, "ab中");
        grid.resize(3, 2);
        assert_eq!(grid.row_text(0), "ab");
        assert_eq!(grid.row(0).unwrap().cells.len(), 3);
        assert_eq!(grid.cursor().col, 2);
    }

    #[test]
    fn test_grow_pads_rows() {
        let mut grid = grid_with(10, 2, "hi");
        grid.resize(20, 4);
        assert!(grid.was_resized());
        assert_eq!(grid.rows(), 4);
        assert_eq!(grid.row(3).unwrap().cells.len(), 20);
        assert_eq!(grid.row_text(0), "hi");
        assert_eq!(grid.scroll_region(), (0, 3));
    }

    // ==================== Damage Tests ====================

    #[test]
    fn test_damage_tracks_touched_rows() {
        let mut grid = Grid::new(10, 3);
        assert_eq!(grid.dirty_rows().count(), 3);
        grid.clear_damage();

        grid.process(b"\x1b[2;1Hx");
        assert_eq!(grid.dirty_rows().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_snapshot_contents() {
        let grid = grid_with(10, 3, "hi");
        let snap = grid.snapshot(PaneId(2), 7);
        assert_eq!(snap.pane_id, PaneId(2));
        assert_eq!(snap.seq, 7);
        assert_eq!((snap.cols, snap.rows), (10, 3));
        assert_eq!(snap.cells.len(), 3);
        assert_eq!(snap.row_text(0), "hi");
        assert_eq!(snap.cursor.col, 2);
        assert!(snap.cursor.visible);
    }
}
