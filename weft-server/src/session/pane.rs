use weft_protocol::{PaneId, PaneInfo, PaneState, Rect, WindowId};

use crate::grid::Grid;
use crate::pane_io::{PaneIo, PaneTerminal, SharedTerminal};

/// A terminal pane within a window
#[derive(Debug)]
pub struct Pane {
    /// Unique pane identifier
    id: PaneId,
    /// Parent window ID
    window_id: WindowId,
    /// Position and size within the window
    rect: Rect,
    /// Current pane state
    state: PaneState,
    /// Screen shared with the output pump
    terminal: SharedTerminal,
    /// Running I/O tasks; `None` once the process has exited
    io: Option<PaneIo>,
    /// Pid of the pane process
    pid: Option<u32>,
}

impl Pane {
    /// Create a pane with a blank screen of the rect's size
    pub fn new(id: PaneId, window_id: WindowId, rect: Rect, history_limit: usize) -> Self {
        let grid = Grid::new(rect.cols, rect.rows).with_history_limit(history_limit);
        Self {
            id,
            window_id,
            rect,
            state: PaneState::Running,
            terminal: PaneTerminal::shared(id, grid),
            io: None,
            pid: None,
        }
    }

    pub fn id(&self) -> PaneId {
        self.id
    }

    pub fn window_id(&self) -> WindowId {
        self.window_id
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn state(&self) -> PaneState {
        self.state
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        matches!(self.state, PaneState::Running)
    }

    pub fn terminal(&self) -> &SharedTerminal {
        &self.terminal
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Attach the running I/O tasks
    pub fn attach_io(&mut self, io: PaneIo, pid: Option<u32>) {
        self.io = Some(io);
        self.pid = pid;
    }

    /// Input queue of the pane process, if it is still running
    pub fn input(&self) -> Option<tokio::sync::mpsc::Sender<Vec<u8>>> {
        self.io.as_ref().map(PaneIo::input)
    }

    /// Record process exit and stop the I/O tasks
    pub fn mark_exited(&mut self, status: Option<i32>) {
        self.state = PaneState::Exited { status };
        if let Some(io) = self.io.take() {
            io.stop();
        }
    }

    /// Move or resize the pane. Returns true if its size changed.
    pub fn set_rect(&mut self, rect: Rect) -> bool {
        let resized = rect.cols != self.rect.cols || rect.rows != self.rect.rows;
        self.rect = rect;
        if resized {
            self.terminal.lock().resize(rect.cols, rect.rows);
        }
        resized
    }

    /// Title set by the program through OSC 0/2
    pub fn title(&self) -> String {
        self.terminal.lock().grid().title().to_string()
    }

    pub fn to_info(&self, index: u32, active: bool) -> PaneInfo {
        PaneInfo {
            id: self.id,
            window_id: self.window_id,
            index,
            rect: self.rect,
            title: self.title(),
            active,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane() -> Pane {
        Pane::new(PaneId(3), WindowId(1), Rect::new(0, 0, 40, 10), 100)
    }

    #[test]
    fn test_pane_creation() {
        let pane = pane();
        assert_eq!(pane.id(), PaneId(3));
        assert_eq!(pane.window_id(), WindowId(1));
        assert!(pane.is_running());
        assert!(pane.input().is_none());
        assert_eq!(pane.terminal().lock().grid().cols(), 40);
    }

    #[test]
    fn test_set_rect_resizes_grid() {
        let mut pane = pane();
        assert!(!pane.set_rect(Rect::new(5, 0, 40, 10)));
        assert!(pane.set_rect(Rect::new(5, 0, 30, 8)));
        let term = pane.terminal().lock();
        assert_eq!((term.grid().cols(), term.grid().rows()), (30, 8));
    }

    #[test]
    fn test_mark_exited() {
        let mut pane = pane();
        pane.mark_exited(Some(2));
        assert_eq!(pane.state(), PaneState::Exited { status: Some(2) });
        assert!(!pane.is_running());
    }

    #[test]
    fn test_info_carries_title() {
        let pane = pane();
        pane.terminal().lock().process(b"\x1b]2;htop\x07");
        let info = pane.to_info(1, true);
        assert_eq!(info.title, "htop");
        assert_eq!(info.index, 1);
        assert!(info.active);
    }
}
