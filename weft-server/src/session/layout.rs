//! Window layout as an arena of split nodes
//!
//! Nodes live in a `Vec` and refer to each other by index, so splitting and
//! removing panes never invalidates references held elsewhere in the tree.
//! Freed slots are recycled through a free list.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use weft_protocol::{PaneId, Rect, SplitDirection};

/// Index of a node in the arena
pub type NodeId = usize;

/// Fixed-point scale for split ratios
const RATIO_SCALE: u64 = 1 << 16;
const HALF: u32 = (RATIO_SCALE / 2) as u32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("pane {0} is not in this layout")]
    PaneNotFound(PaneId),

    #[error("pane too small to split")]
    TooSmall,

    #[error("cannot remove the last pane of a layout")]
    LastPane,
}

/// Built-in arrangements for `select-layout`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPreset {
    EvenHorizontal,
    EvenVertical,
    Tiled,
}

impl LayoutPreset {
    pub fn name(&self) -> &'static str {
        match self {
            LayoutPreset::EvenHorizontal => "even-horizontal",
            LayoutPreset::EvenVertical => "even-vertical",
            LayoutPreset::Tiled => "tiled",
        }
    }
}

impl FromStr for LayoutPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "even-horizontal" => Ok(LayoutPreset::EvenHorizontal),
            "even-vertical" => Ok(LayoutPreset::EvenVertical),
            "tiled" => Ok(LayoutPreset::Tiled),
            other => Err(format!("unknown layout: {}", other)),
        }
    }
}

impl fmt::Display for LayoutPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction for neighbour lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Leaf(PaneId),
    Split {
        direction: SplitDirection,
        /// Share of the split axis given to `first`, out of `RATIO_SCALE`
        ratio: u32,
        first: NodeId,
        second: NodeId,
    },
}

#[derive(Debug, Clone, Copy)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
}

/// Binary split tree with panes at the leaves
#[derive(Debug, Clone)]
pub struct LayoutTree {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    root: NodeId,
}

impl LayoutTree {
    /// Layout holding a single pane
    pub fn new(pane: PaneId) -> Self {
        Self {
            nodes: vec![Some(Node {
                kind: NodeKind::Leaf(pane),
                parent: None,
            })],
            free: Vec::new(),
            root: 0,
        }
    }

    /// Panes in layout order (left to right, top to bottom)
    pub fn panes(&self) -> Vec<PaneId> {
        let mut out = Vec::new();
        self.collect_panes(self.root, &mut out);
        out
    }

    pub fn pane_count(&self) -> usize {
        self.panes().len()
    }

    pub fn contains(&self, pane: PaneId) -> bool {
        self.find_leaf(pane).is_some()
    }

    /// Number of slots in the arena, live or free
    #[cfg(test)]
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Rectangle of every pane inside `area`. The rectangles tile `area`
    /// exactly.
    pub fn compute(&self, area: Rect) -> Vec<(PaneId, Rect)> {
        let mut out = Vec::new();
        self.layout_node(self.root, area, &mut out);
        out
    }

    pub fn rect_of(&self, pane: PaneId, area: Rect) -> Option<Rect> {
        self.compute(area)
            .into_iter()
            .find(|(p, _)| *p == pane)
            .map(|(_, r)| r)
    }

    /// Whether `target` can be split along `direction` inside `area`
    pub fn can_split(
        &self,
        target: PaneId,
        direction: SplitDirection,
        area: Rect,
    ) -> Result<(), LayoutError> {
        let rect = self
            .rect_of(target, area)
            .ok_or(LayoutError::PaneNotFound(target))?;
        if axis_len(rect, direction) < 2 {
            return Err(LayoutError::TooSmall);
        }
        Ok(())
    }

    /// Split `target`, placing `new_pane` after it (or before it when
    /// `before` is set). `new_size` is the new pane's length along the
    /// split axis; by default the space is halved.
    pub fn split(
        &mut self,
        target: PaneId,
        new_pane: PaneId,
        direction: SplitDirection,
        before: bool,
        area: Rect,
        new_size: Option<u16>,
    ) -> Result<(), LayoutError> {
        self.can_split(target, direction, area)?;
        let leaf = self.find_leaf(target).ok_or(LayoutError::PaneNotFound(target))?;
        let rect = self
            .rect_of(target, area)
            .ok_or(LayoutError::PaneNotFound(target))?;
        let total = axis_len(rect, direction);

        let ratio = match new_size {
            Some(size) => {
                let size = size.clamp(1, total - 1);
                let first = if before { size } else { total - size };
                ratio_for(first, total)
            }
            None => HALF,
        };

        let old = self.alloc(NodeKind::Leaf(target), Some(leaf));
        let new = self.alloc(NodeKind::Leaf(new_pane), Some(leaf));
        let (first, second) = if before { (new, old) } else { (old, new) };
        self.node_mut(leaf).kind = NodeKind::Split {
            direction,
            ratio,
            first,
            second,
        };
        Ok(())
    }

    /// Remove `pane`; its sibling takes over the parent's space. Returns the
    /// pane that should become active in its place.
    pub fn remove(&mut self, pane: PaneId) -> Result<PaneId, LayoutError> {
        let leaf = self.find_leaf(pane).ok_or(LayoutError::PaneNotFound(pane))?;
        let parent = self.node(leaf).parent.ok_or(LayoutError::LastPane)?;

        let sibling = match self.node(parent).kind {
            NodeKind::Split { first, second, .. } => {
                if first == leaf {
                    second
                } else {
                    first
                }
            }
            NodeKind::Leaf(_) => unreachable!("leaf {} has a leaf parent", leaf),
        };

        // Hoist the sibling into the parent's slot
        let sibling_kind = self.node(sibling).kind;
        self.node_mut(parent).kind = sibling_kind;
        if let NodeKind::Split { first, second, .. } = sibling_kind {
            self.node_mut(first).parent = Some(parent);
            self.node_mut(second).parent = Some(parent);
        }
        self.release(leaf);
        self.release(sibling);

        let mut focus = parent;
        loop {
            match self.node(focus).kind {
                NodeKind::Leaf(p) => return Ok(p),
                NodeKind::Split { first, .. } => focus = first,
            }
        }
    }

    /// Exchange the positions of two panes
    pub fn swap(&mut self, a: PaneId, b: PaneId) -> Result<(), LayoutError> {
        let la = self.find_leaf(a).ok_or(LayoutError::PaneNotFound(a))?;
        let lb = self.find_leaf(b).ok_or(LayoutError::PaneNotFound(b))?;
        self.node_mut(la).kind = NodeKind::Leaf(b);
        self.node_mut(lb).kind = NodeKind::Leaf(a);
        Ok(())
    }

    /// Grow (positive `delta`) or shrink `pane` along `direction` by moving
    /// the nearest border on that axis. Each side keeps at least one cell.
    /// Returns false when no split on that axis contains the pane.
    pub fn adjust(
        &mut self,
        pane: PaneId,
        direction: SplitDirection,
        delta: i32,
        area: Rect,
    ) -> Result<bool, LayoutError> {
        let leaf = self.find_leaf(pane).ok_or(LayoutError::PaneNotFound(pane))?;

        let mut child = leaf;
        let mut current = self.node(leaf).parent;
        while let Some(id) = current {
            if let NodeKind::Split {
                direction: d,
                first,
                ..
            } = self.node(id).kind
            {
                if d == direction {
                    let Some(rect) = self.node_area(self.root, id, area) else {
                        break;
                    };
                    let total = axis_len(rect, direction);
                    if total < 2 {
                        return Ok(false);
                    }
                    let (_, ratio) = self.split_parts(id);
                    let (low, high) = self.first_bounds(id, total);
                    let old_first = first_len(total, ratio).clamp(low, high) as i32;
                    let signed = if child == first { delta } else { -delta };
                    let new_first = (old_first + signed).clamp(low as i32, high as i32) as u16;
                    self.set_ratio(id, ratio_for(new_first, total));
                    return Ok(true);
                }
            }
            child = id;
            current = self.node(id).parent;
        }
        Ok(false)
    }

    /// Replace the tree with a preset arrangement of `panes`
    pub fn rebuild(&mut self, preset: LayoutPreset, panes: &[PaneId]) {
        if panes.is_empty() {
            return;
        }
        self.nodes.clear();
        self.free.clear();

        match preset {
            LayoutPreset::EvenHorizontal => {
                self.root = self.chain(panes, SplitDirection::Horizontal, None);
            }
            LayoutPreset::EvenVertical => {
                self.root = self.chain(panes, SplitDirection::Vertical, None);
            }
            LayoutPreset::Tiled => {
                let cols = ceil_sqrt(panes.len());
                let rows: Vec<NodeId> = panes
                    .chunks(cols)
                    .map(|row| self.chain(row, SplitDirection::Horizontal, None))
                    .collect();
                self.root = self.chain_nodes(&rows, SplitDirection::Vertical, None);
            }
        }
    }

    /// Pane adjacent to `pane` in `direction`, preferring the one that
    /// overlaps it most.
    pub fn neighbor(&self, pane: PaneId, direction: Direction, area: Rect) -> Option<PaneId> {
        let rects = self.compute(area);
        let (_, from) = rects.iter().find(|(p, _)| *p == pane)?;

        rects
            .iter()
            .filter(|(p, _)| *p != pane)
            .filter_map(|(p, r)| {
                let (adjacent, overlap) = match direction {
                    Direction::Left => (r.x + r.cols == from.x, span_overlap(r.y, r.rows, from.y, from.rows)),
                    Direction::Right => (from.x + from.cols == r.x, span_overlap(r.y, r.rows, from.y, from.rows)),
                    Direction::Up => (r.y + r.rows == from.y, span_overlap(r.x, r.cols, from.x, from.cols)),
                    Direction::Down => (from.y + from.rows == r.y, span_overlap(r.x, r.cols, from.x, from.cols)),
                };
                (adjacent && overlap > 0).then_some((*p, overlap))
            })
            .max_by_key(|(_, overlap)| *overlap)
            .map(|(p, _)| p)
    }

    /// Smallest (cols, rows) that gives every pane at least one cell
    pub fn min_size(&self) -> (u16, u16) {
        self.node_min_size(self.root)
    }

    fn node_min_size(&self, id: NodeId) -> (u16, u16) {
        match self.node(id).kind {
            NodeKind::Leaf(_) => (1, 1),
            NodeKind::Split {
                direction,
                first,
                second,
                ..
            } => {
                let (a, b) = (self.node_min_size(first), self.node_min_size(second));
                match direction {
                    SplitDirection::Horizontal => (a.0.saturating_add(b.0), a.1.max(b.1)),
                    SplitDirection::Vertical => (a.0.max(b.0), a.1.saturating_add(b.1)),
                }
            }
        }
    }

    /// Range of lengths the first child of split `id` may take out of
    /// `total` while both subtrees keep their minimum size
    fn first_bounds(&self, id: NodeId, total: u16) -> (u16, u16) {
        let NodeKind::Split {
            direction,
            first,
            second,
            ..
        } = self.node(id).kind
        else {
            return (total, total);
        };
        let axis = |size: (u16, u16)| match direction {
            SplitDirection::Horizontal => size.0,
            SplitDirection::Vertical => size.1,
        };
        let low = axis(self.node_min_size(first));
        let high = total.saturating_sub(axis(self.node_min_size(second)));
        if low <= high {
            (low, high)
        } else {
            let len = first_len(total, HALF);
            (len, len)
        }
    }

    fn split_area(&self, id: NodeId, area: Rect, direction: SplitDirection, ratio: u32) -> (Rect, Rect) {
        let total = axis_len(area, direction);
        let (low, high) = self.first_bounds(id, total);
        let a = first_len(total, ratio).clamp(low, high);
        match direction {
            SplitDirection::Horizontal => (
                Rect::new(area.x, area.y, a, area.rows),
                Rect::new(area.x + a, area.y, area.cols - a, area.rows),
            ),
            SplitDirection::Vertical => (
                Rect::new(area.x, area.y, area.cols, a),
                Rect::new(area.x, area.y + a, area.cols, area.rows - a),
            ),
        }
    }

    // ==================== Arena helpers ====================

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let node = Some(Node { kind, parent });
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.nodes.get_mut(id) {
            if slot.take().is_some() {
                self.free.push(id);
            }
        }
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id]
            .as_ref()
            .unwrap_or_else(|| panic!("layout node {} is free", id))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id]
            .as_mut()
            .unwrap_or_else(|| panic!("layout node {} is free", id))
    }

    fn find_leaf(&self, pane: PaneId) -> Option<NodeId> {
        self.nodes.iter().enumerate().find_map(|(id, node)| match node {
            Some(Node {
                kind: NodeKind::Leaf(p),
                ..
            }) if *p == pane => Some(id),
            _ => None,
        })
    }

    fn split_parts(&self, id: NodeId) -> (SplitDirection, u32) {
        match self.node(id).kind {
            NodeKind::Split {
                direction, ratio, ..
            } => (direction, ratio),
            NodeKind::Leaf(_) => unreachable!("node {} is not a split", id),
        }
    }

    fn set_ratio(&mut self, id: NodeId, value: u32) {
        if let NodeKind::Split { ratio, .. } = &mut self.node_mut(id).kind {
            *ratio = value;
        }
    }

    fn collect_panes(&self, id: NodeId, out: &mut Vec<PaneId>) {
        match self.node(id).kind {
            NodeKind::Leaf(p) => out.push(p),
            NodeKind::Split { first, second, .. } => {
                self.collect_panes(first, out);
                self.collect_panes(second, out);
            }
        }
    }

    fn layout_node(&self, id: NodeId, area: Rect, out: &mut Vec<(PaneId, Rect)>) {
        match self.node(id).kind {
            NodeKind::Leaf(p) => out.push((p, area)),
            NodeKind::Split {
                direction,
                ratio,
                first,
                second,
            } => {
                let (a, b) = self.split_area(id, area, direction, ratio);
                self.layout_node(first, a, out);
                self.layout_node(second, b, out);
            }
        }
    }

    /// Area occupied by `target` when the subtree at `id` fills `area`
    fn node_area(&self, id: NodeId, target: NodeId, area: Rect) -> Option<Rect> {
        if id == target {
            return Some(area);
        }
        match self.node(id).kind {
            NodeKind::Leaf(_) => None,
            NodeKind::Split {
                direction,
                ratio,
                first,
                second,
            } => {
                let (a, b) = self.split_area(id, area, direction, ratio);
                self.node_area(first, target, a)
                    .or_else(|| self.node_area(second, target, b))
            }
        }
    }

    /// Chain panes along one axis with equal shares
    fn chain(&mut self, panes: &[PaneId], direction: SplitDirection, parent: Option<NodeId>) -> NodeId {
        let leaves: Vec<NodeId> = panes
            .iter()
            .map(|&p| self.alloc(NodeKind::Leaf(p), None))
            .collect();
        self.chain_nodes(&leaves, direction, parent)
    }

    fn chain_nodes(&mut self, items: &[NodeId], direction: SplitDirection, parent: Option<NodeId>) -> NodeId {
        match items {
            [] => unreachable!("empty layout chain"),
            [only] => {
                self.node_mut(*only).parent = parent;
                *only
            }
            [head, rest @ ..] => {
                let n = items.len() as u64;
                let ratio = (RATIO_SCALE / n) as u32;
                let id = self.alloc(NodeKind::Leaf(PaneId(0)), parent);
                let tail = self.chain_nodes(rest, direction, Some(id));
                self.node_mut(*head).parent = Some(id);
                self.node_mut(id).kind = NodeKind::Split {
                    direction,
                    ratio,
                    first: *head,
                    second: tail,
                };
                id
            }
        }
    }
}

fn axis_len(rect: Rect, direction: SplitDirection) -> u16 {
    match direction {
        SplitDirection::Horizontal => rect.cols,
        SplitDirection::Vertical => rect.rows,
    }
}

/// Length given to the first child. Both sides get at least one cell when
/// there are two to share.
fn first_len(total: u16, ratio: u32) -> u16 {
    if total < 2 {
        return total;
    }
    let len = (total as u64 * ratio as u64 + RATIO_SCALE / 2) / RATIO_SCALE;
    (len as u16).clamp(1, total - 1)
}

fn ratio_for(first: u16, total: u16) -> u32 {
    ((first as u64 * RATIO_SCALE + total as u64 / 2) / total.max(1) as u64) as u32
}

fn span_overlap(a: u16, a_len: u16, b: u16, b_len: u16) -> u16 {
    let start = a.max(b);
    let end = (a + a_len).min(b + b_len);
    end.saturating_sub(start)
}

fn ceil_sqrt(n: usize) -> usize {
    let mut root = 1;
    while root * root < n {
        root += 1;
    }
    root
}
