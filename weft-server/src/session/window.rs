use std::collections::HashMap;

use weft_protocol::{PaneId, PaneInfo, Rect, SessionId, SplitDirection, WindowId, WindowInfo};

use super::layout::{Direction, LayoutError, LayoutPreset, LayoutTree};
use super::Pane;

/// A window containing one or more panes
#[derive(Debug)]
pub struct Window {
    /// Unique window identifier
    id: WindowId,
    /// Parent session ID
    session_id: SessionId,
    /// Window name
    name: String,
    /// Index within the session
    index: u32,
    /// Arrangement of the panes
    layout: LayoutTree,
    /// Panes in this window
    panes: HashMap<PaneId, Pane>,
    /// Currently active pane
    active_pane: PaneId,
    /// Previously active pane, for `select-pane -l`
    last_pane: Option<PaneId>,
    cols: u16,
    rows: u16,
}

impl Window {
    /// Create a window around its first pane, which fills the window
    pub fn new(
        id: WindowId,
        session_id: SessionId,
        index: u32,
        name: impl Into<String>,
        mut first: Pane,
        cols: u16,
        rows: u16,
    ) -> Self {
        let pane_id = first.id();
        first.set_rect(Rect::new(0, 0, cols, rows));
        let mut panes = HashMap::new();
        panes.insert(pane_id, first);
        Self {
            id,
            session_id,
            name: name.into(),
            index,
            layout: LayoutTree::new(pane_id),
            panes,
            active_pane: pane_id,
            last_pane: None,
            cols,
            rows,
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Full window rectangle
    pub fn area(&self) -> Rect {
        Rect::new(0, 0, self.cols, self.rows)
    }

    pub fn layout(&self) -> &LayoutTree {
        &self.layout
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    /// Pane ids in layout order
    pub fn pane_ids(&self) -> Vec<PaneId> {
        self.layout.panes()
    }

    /// Panes in layout order
    pub fn panes(&self) -> Vec<&Pane> {
        self.pane_ids()
            .into_iter()
            .filter_map(|id| self.panes.get(&id))
            .collect()
    }

    pub fn pane(&self, pane_id: PaneId) -> Option<&Pane> {
        self.panes.get(&pane_id)
    }

    pub fn pane_mut(&mut self, pane_id: PaneId) -> Option<&mut Pane> {
        self.panes.get_mut(&pane_id)
    }

    pub fn contains(&self, pane_id: PaneId) -> bool {
        self.panes.contains_key(&pane_id)
    }

    pub fn active_pane_id(&self) -> PaneId {
        self.active_pane
    }

    pub fn active_pane(&self) -> Option<&Pane> {
        self.panes.get(&self.active_pane)
    }

    pub fn last_pane_id(&self) -> Option<PaneId> {
        self.last_pane.filter(|id| self.panes.contains_key(id))
    }

    /// Make `pane_id` active. Returns false if it is not in this window.
    pub fn set_active_pane(&mut self, pane_id: PaneId) -> bool {
        if !self.panes.contains_key(&pane_id) {
            return false;
        }
        if pane_id != self.active_pane {
            self.last_pane = Some(self.active_pane);
            self.active_pane = pane_id;
        }
        true
    }

    /// Position of a pane in layout order, offset by `base`
    #[cfg(test)]
    pub fn pane_index(&self, pane_id: PaneId, base: u32) -> Option<u32> {
        self.pane_ids()
            .iter()
            .position(|id| *id == pane_id)
            .map(|pos| pos as u32 + base)
    }

    pub fn pane_by_index(&self, index: u32, base: u32) -> Option<PaneId> {
        let pos = index.checked_sub(base)? as usize;
        self.pane_ids().get(pos).copied()
    }

    pub fn neighbor(&self, pane_id: PaneId, direction: Direction) -> Option<PaneId> {
        self.layout.neighbor(pane_id, direction, self.area())
    }

    pub fn can_split(&self, target: PaneId, direction: SplitDirection) -> Result<(), LayoutError> {
        self.layout.can_split(target, direction, self.area())
    }

    /// Split `target` and insert `pane` next to it. Returns the panes whose
    /// size changed, including the new one.
    #[cfg(test)]
    pub fn split(
        &mut self,
        target: PaneId,
        pane: Pane,
        direction: SplitDirection,
        before: bool,
        size: Option<u16>,
    ) -> Result<Vec<(PaneId, Rect)>, LayoutError> {
        let area = self.area();
        self.layout
            .split(target, pane.id(), direction, before, area, size)?;
        self.panes.insert(pane.id(), pane);
        Ok(self.apply_layout())
    }

    /// Insert `pane` and adopt `layout`, a split of the current layout
    /// that already places it. Returns the panes whose size changed.
    pub fn insert_split(&mut self, pane: Pane, layout: LayoutTree) -> Vec<(PaneId, Rect)> {
        self.layout = layout;
        self.panes.insert(pane.id(), pane);
        self.apply_layout()
    }

    /// Remove a pane other than the last one. Returns the pane and the panes
    /// whose size changed.
    pub fn remove_pane(&mut self, pane_id: PaneId) -> Result<(Pane, Vec<(PaneId, Rect)>), LayoutError> {
        let focus = self.layout.remove(pane_id)?;
        let pane = self
            .panes
            .remove(&pane_id)
            .ok_or(LayoutError::PaneNotFound(pane_id))?;

        if self.active_pane == pane_id {
            self.active_pane = self.last_pane_id().unwrap_or(focus);
            self.last_pane = None;
        }
        if self.last_pane == Some(pane_id) {
            self.last_pane = None;
        }
        Ok((pane, self.apply_layout()))
    }

    pub fn swap_panes(&mut self, a: PaneId, b: PaneId) -> Result<Vec<(PaneId, Rect)>, LayoutError> {
        self.layout.swap(a, b)?;
        Ok(self.apply_layout())
    }

    /// Grow or shrink a pane. Returns None when no border can move.
    pub fn adjust_pane(
        &mut self,
        pane_id: PaneId,
        direction: SplitDirection,
        delta: i32,
    ) -> Result<Option<Vec<(PaneId, Rect)>>, LayoutError> {
        let area = self.area();
        if self.layout.adjust(pane_id, direction, delta, area)? {
            Ok(Some(self.apply_layout()))
        } else {
            Ok(None)
        }
    }

    pub fn select_layout(&mut self, preset: LayoutPreset) -> Vec<(PaneId, Rect)> {
        let panes = self.layout.panes();
        self.layout.rebuild(preset, &panes);
        self.apply_layout()
    }

    /// Change the window size and recompute every pane
    pub fn resize(&mut self, cols: u16, rows: u16) -> Vec<(PaneId, Rect)> {
        self.cols = cols.max(1);
        self.rows = rows.max(1);
        self.apply_layout()
    }

    /// Push layout rects to the panes. Returns the panes whose size changed.
    /// The window grows to the layout's minimum size when it is smaller, so
    /// no pane is ever left without cells.
    fn apply_layout(&mut self) -> Vec<(PaneId, Rect)> {
        let (min_cols, min_rows) = self.layout.min_size();
        self.cols = self.cols.max(min_cols);
        self.rows = self.rows.max(min_rows);
        let mut resized = Vec::new();
        for (pane_id, rect) in self.layout.compute(self.area()) {
            if let Some(pane) = self.panes.get_mut(&pane_id) {
                if pane.set_rect(rect) {
                    resized.push((pane_id, rect));
                }
            }
        }
        resized
    }

    pub fn to_info(&self, active: bool) -> WindowInfo {
        WindowInfo {
            id: self.id,
            session_id: self.session_id,
            index: self.index,
            name: self.name.clone(),
            active,
            pane_count: self.panes.len(),
            cols: self.cols,
            rows: self.rows,
        }
    }

    /// Pane descriptions in layout order
    pub fn pane_infos(&self, base: u32) -> Vec<PaneInfo> {
        self.panes()
            .into_iter()
            .enumerate()
            .map(|(pos, pane)| pane.to_info(pos as u32 + base, pane.id() == self.active_pane))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane(id: u32) -> Pane {
        Pane::new(PaneId(id), WindowId(1), Rect::new(0, 0, 80, 24), 100)
    }

    fn window() -> Window {
        Window::new(WindowId(1), SessionId(0), 0, "main", pane(0), 80, 24)
    }

    fn total_area(window: &Window) -> u32 {
        window
            .panes()
            .iter()
            .map(|p| p.rect().cols as u32 * p.rect().rows as u32)
            .sum()
    }

    // ==================== Window Tests ====================

    #[test]
    fn test_window_creation() {
        let window = window();
        assert_eq!(window.name(), "main");
        assert_eq!(window.pane_count(), 1);
        assert_eq!(window.active_pane_id(), PaneId(0));
        assert_eq!(window.pane(PaneId(0)).unwrap().rect(), window.area());
    }

    #[test]
    fn test_split_resizes_both() {
        let mut window = window();
        let resized = window
            .split(PaneId(0), pane(1), SplitDirection::Horizontal, false, None)
            .unwrap();
        assert_eq!(resized.len(), 2);
        assert_eq!(window.pane_ids(), vec![PaneId(0), PaneId(1)]);
        assert_eq!(window.pane(PaneId(1)).unwrap().rect(), Rect::new(40, 0, 40, 24));
    }

    #[test]
    fn test_resize_below_layout_minimum_grows_window() {
        let mut window = window();
        window
            .split(PaneId(0), pane(1), SplitDirection::Horizontal, false, None)
            .unwrap();
        window
            .split(PaneId(1), pane(2), SplitDirection::Horizontal, false, None)
            .unwrap();

        window.resize(1, 1);
        assert_eq!(window.size(), (3, 1));
        for pane in window.panes() {
            assert_eq!((pane.rect().cols, pane.rect().rows), (1, 1));
        }
        assert_eq!(total_area(&window), 3);
    }

    #[test]
    fn test_kill_pane_fills_window() {
        let mut window = window();
        window
            .split(PaneId(0), pane(1), SplitDirection::Horizontal, false, None)
            .unwrap();
        window
            .split(PaneId(1), pane(2), SplitDirection::Vertical, false, None)
            .unwrap();
        window.set_active_pane(PaneId(2));

        let (removed, _) = window.remove_pane(PaneId(2)).unwrap();
        assert_eq!(removed.id(), PaneId(2));
        assert_eq!(window.pane_count(), 2);
        assert_eq!(total_area(&window), 80 * 24);
        assert_eq!(window.pane(PaneId(1)).unwrap().rect(), Rect::new(40, 0, 40, 24));
        // Focus returns to the previously active pane
        assert_eq!(window.active_pane_id(), PaneId(0));
    }

    #[test]
    fn test_remove_last_pane_refused() {
        let mut window = window();
        assert!(matches!(
            window.remove_pane(PaneId(0)),
            Err(LayoutError::LastPane)
        ));
        assert_eq!(window.pane_count(), 1);
    }

    #[test]
    fn test_active_and_last_pane() {
        let mut window = window();
        window
            .split(PaneId(0), pane(1), SplitDirection::Vertical, false, None)
            .unwrap();
        assert!(window.set_active_pane(PaneId(1)));
        assert_eq!(window.last_pane_id(), Some(PaneId(0)));
        assert!(!window.set_active_pane(PaneId(9)));
    }

    #[test]
    fn test_pane_index_with_base() {
        let mut window = window();
        window
            .split(PaneId(0), pane(1), SplitDirection::Vertical, true, None)
            .unwrap();
        assert_eq!(window.pane_index(PaneId(1), 1), Some(1));
        assert_eq!(window.pane_index(PaneId(0), 1), Some(2));
        assert_eq!(window.pane_by_index(2, 1), Some(PaneId(0)));
        assert_eq!(window.pane_by_index(0, 1), None);
    }

    #[test]
    fn test_resize_recomputes_panes() {
        let mut window = window();
        window
            .split(PaneId(0), pane(1), SplitDirection::Horizontal, false, None)
            .unwrap();
        let resized = window.resize(100, 30);
        assert_eq!(resized.len(), 2);
        assert_eq!(total_area(&window), 100 * 30);

        assert!(window.resize(100, 30).is_empty());
    }

    #[test]
    fn test_select_layout() {
        let mut window = window();
        window
            .split(PaneId(0), pane(1), SplitDirection::Horizontal, false, None)
            .unwrap();
        window.select_layout(LayoutPreset::EvenVertical);
        assert_eq!(window.pane(PaneId(0)).unwrap().rect(), Rect::new(0, 0, 80, 12));
        assert_eq!(window.pane(PaneId(1)).unwrap().rect(), Rect::new(0, 12, 80, 12));
    }

    #[test]
    fn test_pane_infos() {
        let mut window = window();
        window
            .split(PaneId(0), pane(1), SplitDirection::Horizontal, false, None)
            .unwrap();
        window.set_active_pane(PaneId(1));
        let infos = window.pane_infos(0);
        assert_eq!(infos.len(), 2);
        assert!(!infos[0].active);
        assert!(infos[1].active);
        assert_eq!(infos[1].index, 1);
    }
}
