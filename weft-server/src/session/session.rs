use std::time::{SystemTime, UNIX_EPOCH};

use weft_protocol::{SessionId, SessionInfo, WindowId};

use super::Window;

/// A named group of windows
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier
    id: SessionId,
    /// Session name, unique on the server
    name: String,
    /// Windows ordered by index
    windows: Vec<Window>,
    /// Currently selected window
    current: Option<WindowId>,
    /// Previously selected window, for `select-window -l`
    last_window: Option<WindowId>,
    cols: u16,
    rows: u16,
    /// Creation time, seconds since the Unix epoch
    created_at: u64,
    /// Number of attached clients
    attached: usize,
}

impl Session {
    /// Create an empty session
    pub fn new(id: SessionId, name: impl Into<String>, cols: u16, rows: u16) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id,
            name: name.into(),
            windows: Vec::new(),
            current: None,
            last_window: None,
            cols: cols.max(1),
            rows: rows.max(1),
            created_at,
            attached: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn attached(&self) -> usize {
        self.attached
    }

    pub fn set_attached(&mut self, count: usize) {
        self.attached = count;
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Windows in index order
    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter()
    }

    pub fn windows_mut(&mut self) -> impl Iterator<Item = &mut Window> {
        self.windows.iter_mut()
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows.iter().find(|w| w.id() == id)
    }

    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id() == id)
    }

    pub fn window_by_index(&self, index: u32) -> Option<&Window> {
        self.windows.iter().find(|w| w.index() == index)
    }

    /// Window with exactly this name, else the only window whose name
    /// starts with it
    pub fn window_by_name(&self, name: &str) -> Option<&Window> {
        if let Some(w) = self.windows.iter().find(|w| w.name() == name) {
            return Some(w);
        }
        let mut matches = self.windows.iter().filter(|w| w.name().starts_with(name));
        match (matches.next(), matches.next()) {
            (Some(w), None) => Some(w),
            _ => None,
        }
    }

    /// Lowest free window index at or above `base`
    pub fn next_index(&self, base: u32) -> u32 {
        let mut index = base;
        while self.windows.iter().any(|w| w.index() == index) {
            index += 1;
        }
        index
    }

    /// Add a window. The first window becomes current.
    pub fn add_window(&mut self, window: Window) {
        debug_assert!(self.window_by_index(window.index()).is_none());
        let pos = self
            .windows
            .iter()
            .position(|w| w.index() > window.index())
            .unwrap_or(self.windows.len());
        if self.current.is_none() {
            self.current = Some(window.id());
        }
        self.windows.insert(pos, window);
    }

    /// Remove a window. If it was current, the previously selected window
    /// takes over, or else its neighbour.
    pub fn remove_window(&mut self, id: WindowId) -> Option<Window> {
        let pos = self.windows.iter().position(|w| w.id() == id)?;
        let window = self.windows.remove(pos);

        if self.last_window == Some(id) {
            self.last_window = None;
        }
        if self.current == Some(id) {
            self.current = self
                .last_window
                .take()
                .or_else(|| self.windows.get(pos).map(Window::id))
                .or_else(|| self.windows.last().map(Window::id));
        }
        Some(window)
    }

    pub fn current_window_id(&self) -> Option<WindowId> {
        self.current
    }

    pub fn current_window(&self) -> Option<&Window> {
        self.current.and_then(|id| self.window(id))
    }

    pub fn last_window_id(&self) -> Option<WindowId> {
        self.last_window
    }

    /// Make `id` the current window. Returns false if it is not in this
    /// session.
    pub fn select_window(&mut self, id: WindowId) -> bool {
        if self.window(id).is_none() {
            return false;
        }
        if self.current != Some(id) {
            self.last_window = self.current;
            self.current = Some(id);
        }
        true
    }

    /// Record the size attached clients agreed on. Windows are resized
    /// separately since some of them may have a manual size.
    pub fn set_size(&mut self, cols: u16, rows: u16) -> bool {
        let (cols, rows) = (cols.max(1), rows.max(1));
        let changed = (cols, rows) != (self.cols, self.rows);
        self.cols = cols;
        self.rows = rows;
        changed
    }

    pub fn to_info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            name: self.name.clone(),
            window_count: self.windows.len(),
            attached_clients: self.attached,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Pane;
    use weft_protocol::{PaneId, Rect};

    fn window(id: u32, index: u32, name: &str) -> Window {
        let pane = Pane::new(PaneId(id), WindowId(id), Rect::new(0, 0, 80, 24), 10);
        Window::new(WindowId(id), SessionId(0), index, name, pane, 80, 24)
    }

    fn session() -> Session {
        Session::new(SessionId(0), "work", 80, 24)
    }

    // ==================== Window Tests ====================

    #[test]
    fn test_first_window_becomes_current() {
        let mut session = session();
        assert!(session.current_window().is_none());
        session.add_window(window(1, 0, "a"));
        session.add_window(window(2, 1, "b"));
        assert_eq!(session.current_window_id(), Some(WindowId(1)));
        assert_eq!(session.window_count(), 2);
    }

    #[test]
    fn test_windows_ordered_by_index() {
        let mut session = session();
        session.add_window(window(1, 5, "a"));
        session.add_window(window(2, 2, "b"));
        session.add_window(window(3, 9, "c"));
        let indices: Vec<u32> = session.windows().map(|w| w.index()).collect();
        assert_eq!(indices, vec![2, 5, 9]);
    }

    #[test]
    fn test_next_index_fills_gaps() {
        let mut session = session();
        assert_eq!(session.next_index(1), 1);
        session.add_window(window(1, 1, "a"));
        session.add_window(window(2, 3, "b"));
        assert_eq!(session.next_index(1), 2);
        assert_eq!(session.next_index(3), 4);
    }

    #[test]
    fn test_window_lookup_by_name() {
        let mut session = session();
        session.add_window(window(1, 0, "editor"));
        session.add_window(window(2, 1, "logs"));
        session.add_window(window(3, 2, "logs-old"));
        assert_eq!(session.window_by_name("editor").unwrap().id(), WindowId(1));
        assert_eq!(session.window_by_name("ed").unwrap().id(), WindowId(1));
        // Exact match beats prefix ambiguity
        assert_eq!(session.window_by_name("logs").unwrap().id(), WindowId(2));
        assert!(session.window_by_name("log").is_none());
    }

    #[test]
    fn test_select_records_last_window() {
        let mut session = session();
        session.add_window(window(1, 0, "a"));
        session.add_window(window(2, 1, "b"));
        assert!(session.select_window(WindowId(2)));
        assert_eq!(session.last_window_id(), Some(WindowId(1)));
        assert!(!session.select_window(WindowId(7)));
    }

    #[test]
    fn test_remove_current_prefers_last() {
        let mut session = session();
        session.add_window(window(1, 0, "a"));
        session.add_window(window(2, 1, "b"));
        session.add_window(window(3, 2, "c"));
        session.select_window(WindowId(3));
        session.select_window(WindowId(2));

        session.remove_window(WindowId(2)).unwrap();
        assert_eq!(session.current_window_id(), Some(WindowId(3)));
    }

    #[test]
    fn test_remove_current_falls_back_to_neighbour() {
        let mut session = session();
        session.add_window(window(1, 0, "a"));
        session.add_window(window(2, 1, "b"));

        session.remove_window(WindowId(1)).unwrap();
        assert_eq!(session.current_window_id(), Some(WindowId(2)));

        session.remove_window(WindowId(2)).unwrap();
        assert_eq!(session.current_window_id(), None);
        assert!(session.is_empty());
    }

    // ==================== Resize Tests ====================

    #[test]
    fn test_set_size() {
        let mut session = session();
        assert!(!session.set_size(80, 24));
        assert!(session.set_size(100, 40));
        assert_eq!(session.size(), (100, 40));
        assert!(session.set_size(0, 0));
        assert_eq!(session.size(), (1, 1));
    }

    #[test]
    fn test_info() {
        let mut session = session();
        session.add_window(window(1, 0, "a"));
        session.set_attached(2);
        let info = session.to_info();
        assert_eq!(info.name, "work");
        assert_eq!(info.window_count, 1);
        assert_eq!(info.attached_clients, 2);
    }
}
