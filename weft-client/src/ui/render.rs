//! Drawing the mirrored pane, pane separators and the status line

use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect},
    style::{Color as TuiColor, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};

use weft_protocol::{Attrs, Cell, Color, PaneInfo};

use super::LayoutState;
use crate::mirror::MirrorGrid;

/// Everything one frame needs
pub struct View<'a> {
    pub mirror: Option<&'a MirrorGrid>,
    pub layout: Option<&'a LayoutState>,
    pub message: Option<&'a str>,
    pub read_only: bool,
    pub prefix_pending: bool,
}

pub fn draw(frame: &mut Frame, view: &View) {
    let area = frame.area();
    let (body, status) = split_status(area);
    frame.render_widget(
        WindowWidget {
            mirror: view.mirror,
            layout: view.layout,
        },
        body,
    );
    if status.height > 0 {
        frame.render_widget(status_line(view), status);
    }
    if let Some(position) = cursor_position(view, body) {
        frame.set_cursor_position(position);
    }
}

fn split_status(area: Rect) -> (Rect, Rect) {
    let status_height = area.height.min(1);
    let body = Rect {
        height: area.height - status_height,
        ..area
    };
    let status = Rect {
        y: area.y + body.height,
        height: status_height,
        ..area
    };
    (body, status)
}

/// Top-left corner of the mirrored pane inside the window
fn pane_origin(mirror: &MirrorGrid, layout: Option<&LayoutState>) -> (u16, u16) {
    layout
        .and_then(|l| l.panes.iter().find(|p| p.id == mirror.pane_id()))
        .map(|p| (p.rect.x, p.rect.y))
        .unwrap_or((0, 0))
}

/// Where the terminal cursor goes, if the pane shows one
pub fn cursor_position(view: &View, body: Rect) -> Option<Position> {
    let mirror = view.mirror?;
    let cursor = mirror.cursor();
    if !cursor.visible {
        return None;
    }
    let (x, y) = pane_origin(mirror, view.layout);
    let col = x.checked_add(cursor.col)?;
    let row = y.checked_add(cursor.row)?;
    if col >= body.width || row >= body.height {
        return None;
    }
    Some(Position::new(body.x + col, body.y + row))
}

fn status_line(view: &View) -> Paragraph<'static> {
    let mut spans = Vec::new();
    match view.layout {
        Some(layout) => {
            spans.push(Span::raw(format!("[{}] ", layout.session.name)));
            spans.push(Span::raw(format!(
                "{}:{}*",
                layout.window.index, layout.window.name
            )));
        }
        None => spans.push(Span::raw("[weft]")),
    }
    if view.read_only {
        spans.push(Span::raw(" (read-only)"));
    }
    if view.prefix_pending {
        spans.push(Span::styled(
            " ^B",
            Style::default().add_modifier(Modifier::BOLD),
        ));
    }
    let right = view
        .message
        .map(str::to_string)
        .or_else(|| view.mirror.map(|m| format!("\"{}\"", m.title())));
    if let Some(right) = right {
        spans.push(Span::raw(format!("  {}", right)));
    }
    Paragraph::new(Line::from(spans))
        .style(Style::default().fg(TuiColor::Black).bg(TuiColor::Green))
}

struct WindowWidget<'a> {
    mirror: Option<&'a MirrorGrid>,
    layout: Option<&'a LayoutState>,
}

/// The pane owning cell (x, y) of the window
fn owner(panes: &[PaneInfo], x: u16, y: u16) -> Option<&PaneInfo> {
    panes.iter().find(|p| {
        x >= p.rect.x && x < p.rect.x + p.rect.cols && y >= p.rect.y && y < p.rect.y + p.rect.rows
    })
}

impl Widget for WindowWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if let Some(layout) = self.layout {
            draw_separators(layout, area, buf);
        }
        let Some(mirror) = self.mirror else {
            return;
        };
        let (origin_x, origin_y) = pane_origin(mirror, self.layout);
        for row in 0..mirror.rows() {
            let y = origin_y.saturating_add(row);
            if y >= area.height {
                break;
            }
            for col in 0..mirror.cols() {
                let x = origin_x.saturating_add(col);
                if x >= area.width {
                    break;
                }
                let (Some(src), Some(dst)) = (
                    mirror.cell(row, col),
                    buf.cell_mut((area.x + x, area.y + y)),
                ) else {
                    continue;
                };
                if src.is_continuation() {
                    dst.reset();
                    dst.set_style(cell_style(src));
                } else {
                    dst.set_char(src.ch).set_style(cell_style(src));
                }
            }
        }
    }
}

/// Only the observed pane is mirrored, so the other panes are blank. Their
/// edge cells facing a neighbouring pane become separators, highlighted
/// where the neighbour is the active pane.
fn draw_separators(layout: &LayoutState, area: Rect, buf: &mut Buffer) {
    if layout.panes.len() < 2 {
        return;
    }
    let width = layout.window.cols.min(area.width);
    let height = layout.window.rows.min(area.height);
    for y in 0..height {
        for x in 0..width {
            let Some(pane) = owner(&layout.panes, x, y) else {
                continue;
            };
            if pane.active {
                continue;
            }
            let r = pane.rect;
            let across = |nx: Option<u16>, ny: Option<u16>| match (nx, ny) {
                (Some(nx), Some(ny)) if nx < width && ny < height => {
                    owner(&layout.panes, nx, ny).filter(|n| n.id != pane.id)
                }
                _ => None,
            };
            let vertical = [
                (x == r.x).then(|| across(x.checked_sub(1), Some(y))).flatten(),
                (x + 1 == r.x + r.cols).then(|| across(Some(x + 1), Some(y))).flatten(),
            ];
            let horizontal = [
                (y == r.y).then(|| across(Some(x), y.checked_sub(1))).flatten(),
                (y + 1 == r.y + r.rows).then(|| across(Some(x), Some(y + 1))).flatten(),
            ];
            let symbol = if vertical.iter().any(Option::is_some) {
                "│"
            } else if horizontal.iter().any(Option::is_some) {
                "─"
            } else {
                continue;
            };
            let beside_active = vertical
                .iter()
                .chain(horizontal.iter())
                .flatten()
                .any(|n| n.active);
            let style = if beside_active {
                Style::default().fg(TuiColor::Green)
            } else {
                Style::default()
            };
            if let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) {
                cell.set_symbol(symbol).set_style(style);
            }
        }
    }
}

fn cell_style(cell: &Cell) -> Style {
    Style::default()
        .fg(tui_color(cell.fg))
        .bg(tui_color(cell.bg))
        .add_modifier(modifiers(cell.attrs))
}

fn tui_color(color: Color) -> TuiColor {
    match color {
        Color::Default => TuiColor::Reset,
        Color::Indexed(i) => TuiColor::Indexed(i),
        Color::Rgb(r, g, b) => TuiColor::Rgb(r, g, b),
    }
}

fn modifiers(attrs: Attrs) -> Modifier {
    const MAP: [(Attrs, Modifier); 8] = [
        (Attrs::BOLD, Modifier::BOLD),
        (Attrs::DIM, Modifier::DIM),
        (Attrs::ITALIC, Modifier::ITALIC),
        (Attrs::UNDERLINE, Modifier::UNDERLINED),
        (Attrs::BLINK, Modifier::SLOW_BLINK),
        (Attrs::REVERSE, Modifier::REVERSED),
        (Attrs::HIDDEN, Modifier::HIDDEN),
        (Attrs::STRIKETHROUGH, Modifier::CROSSED_OUT),
    ];
    MAP.iter()
        .filter(|(attr, _)| attrs.contains(*attr))
        .fold(Modifier::empty(), |acc, (_, m)| acc | *m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use weft_protocol::{
        CursorState, GridSnapshot, PaneId, PaneState, SessionId, SessionInfo, WindowId,
        WindowInfo,
    };

    fn mirror(pane: u32, text: &str, cols: u16, rows: u16) -> MirrorGrid {
        let mut cells = vec![vec![Cell::blank(); cols as usize]; rows as usize];
        for (i, ch) in text.chars().enumerate() {
            cells[0][i] = Cell { ch, ..Cell::blank() };
        }
        MirrorGrid::from_snapshot(GridSnapshot {
            pane_id: PaneId(pane),
            seq: 0,
            cols,
            rows,
            cells,
            wrapped: vec![false; rows as usize],
            cursor: CursorState {
                col: text.len() as u16,
                visible: true,
                ..CursorState::default()
            },
            title: "sh".into(),
        })
    }

    fn pane(id: u32, rect: weft_protocol::Rect, active: bool) -> PaneInfo {
        PaneInfo {
            id: PaneId(id),
            window_id: WindowId(0),
            index: id,
            rect,
            title: String::new(),
            active,
            state: PaneState::Running,
        }
    }

    /// Two panes side by side in a 9x3 window, the right one active
    fn split_layout() -> LayoutState {
        LayoutState {
            session: SessionInfo {
                id: SessionId(0),
                name: "work".into(),
                window_count: 1,
                attached_clients: 1,
                created_at: 0,
            },
            window: WindowInfo {
                id: WindowId(0),
                session_id: SessionId(0),
                index: 0,
                name: "sh".into(),
                active: true,
                pane_count: 2,
                cols: 9,
                rows: 3,
            },
            panes: vec![
                pane(0, weft_protocol::Rect::new(0, 0, 4, 3), false),
                pane(1, weft_protocol::Rect::new(4, 0, 5, 3), true),
            ],
        }
    }

    fn render(view: &View, cols: u16, rows: u16) -> Buffer {
        let mut terminal = ratatui::Terminal::new(TestBackend::new(cols, rows)).unwrap();
        terminal.draw(|frame| draw(frame, view)).unwrap();
        terminal.backend().buffer().clone()
    }

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol().to_string()).collect()
    }

    // ==================== Pane Tests ====================

    #[test]
    fn test_mirror_drawn_at_origin_without_layout() {
        let m = mirror(1, "Hello", 10, 3);
        let view = View {
            mirror: Some(&m),
            layout: None,
            message: None,
            read_only: false,
            prefix_pending: false,
        };
        let buf = render(&view, 10, 4);
        assert_eq!(row(&buf, 0), "Hello     ");
        assert!(row(&buf, 3).starts_with("[weft]"));
    }

    #[test]
    fn test_mirror_drawn_at_active_pane_rect() {
        let m = mirror(1, "hi", 5, 3);
        let layout = split_layout();
        let view = View {
            mirror: Some(&m),
            layout: Some(&layout),
            message: None,
            read_only: false,
            prefix_pending: false,
        };
        let buf = render(&view, 9, 4);
        assert_eq!(row(&buf, 0), "   │hi   ");
        assert_eq!(row(&buf, 1), "   │     ");
        assert_eq!(buf[(3, 0)].fg, TuiColor::Green);
    }

    #[test]
    fn test_cell_attributes_mapped() {
        let mut m = mirror(1, "", 2, 1);
        let mut delta_cell = Cell {
            ch: 'x',
            fg: Color::Indexed(1),
            bg: Color::Rgb(1, 2, 3),
            ..Cell::blank()
        };
        delta_cell.attrs = Attrs::BOLD | Attrs::REVERSE;
        m.apply_delta(weft_protocol::GridDelta {
            pane_id: PaneId(1),
            seq: 1,
            runs: vec![weft_protocol::CellRun {
                row: 0,
                col: 0,
                cells: vec![delta_cell],
            }],
            cursor: CursorState::default(),
            title: None,
            bell: false,
        });
        let view = View {
            mirror: Some(&m),
            layout: None,
            message: None,
            read_only: false,
            prefix_pending: false,
        };
        let buf = render(&view, 2, 2);
        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "x");
        assert_eq!(cell.fg, TuiColor::Indexed(1));
        assert_eq!(cell.bg, TuiColor::Rgb(1, 2, 3));
        assert!(cell.modifier.contains(Modifier::BOLD | Modifier::REVERSED));
    }

    // ==================== Cursor Tests ====================

    #[test]
    fn test_cursor_offset_by_pane_rect() {
        let m = mirror(1, "hi", 5, 3);
        let layout = split_layout();
        let view = View {
            mirror: Some(&m),
            layout: Some(&layout),
            message: None,
            read_only: false,
            prefix_pending: false,
        };
        assert_eq!(
            cursor_position(&view, Rect::new(0, 0, 9, 3)),
            Some(Position::new(6, 0))
        );
    }

    #[test]
    fn test_cursor_outside_body_hidden() {
        let m = mirror(1, "hi", 4, 3);
        let view = View {
            mirror: Some(&m),
            layout: None,
            message: None,
            read_only: false,
            prefix_pending: false,
        };
        assert_eq!(cursor_position(&view, Rect::new(0, 0, 2, 3)), None);
    }

    // ==================== Status Line Tests ====================

    #[test]
    fn test_status_line_contents() {
        let m = mirror(1, "", 4, 3);
        let layout = split_layout();
        let view = View {
            mirror: Some(&m),
            layout: Some(&layout),
            message: Some("read-only client"),
            read_only: true,
            prefix_pending: false,
        };
        let buf = render(&view, 60, 4);
        let status = row(&buf, 3);
        assert!(status.starts_with("[work] 0:sh* (read-only)  read-only client"), "{}", status);
    }

    #[test]
    fn test_modifier_mapping() {
        assert_eq!(modifiers(Attrs::empty()), Modifier::empty());
        assert_eq!(
            modifiers(Attrs::ITALIC | Attrs::STRIKETHROUGH),
            Modifier::ITALIC | Modifier::CROSSED_OUT
        );
    }
}
