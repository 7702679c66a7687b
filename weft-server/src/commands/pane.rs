//! Pane commands and pane process exit

use tracing::{debug, info};
use weft_protocol::{Dimensions, PaneId, ServerMessage, SplitDirection};

use crate::hooks::HookEvent;
use crate::options::{OptionTarget, OptionValue, ScopeTarget};
use crate::session::{Direction, LayoutPreset, Pane, SessionManager, Window};

use super::exec::SpawnRequest;
use super::keys::encode_keys;
use super::{CommandError, CommandOutput, Executor, ListScope, Origin, Reply, SplitSize};

#[derive(Debug)]
pub(super) struct SplitWindow {
    pub target: Option<String>,
    pub direction: SplitDirection,
    pub before: bool,
    pub detached: bool,
    pub print: bool,
    pub size: Option<SplitSize>,
    pub cwd: Option<String>,
    pub command: Option<String>,
}

impl Executor {
    /// Split a pane. The split is planned on a copy of the layout, which is
    /// committed only once the new process runs at its final size.
    pub(super) fn split_window(&mut self, model: &mut SessionManager, origin: &Origin, req: SplitWindow) -> Reply {
        let (session_id, window_id, target) = self.resolver(model, origin).pane(req.target.as_deref())?;
        let pane_id = model.alloc_pane_id();

        let window = model
            .session(session_id)
            .and_then(|s| s.window(window_id))
            .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;
        let area = window.area();
        let target_rect = window
            .pane(target)
            .map(Pane::rect)
            .ok_or_else(|| CommandError::PaneNotFound(target.to_string()))?;
        let cells = req.size.map(|size| match size {
            SplitSize::Cells(n) => n,
            SplitSize::Percent(pct) => {
                let axis = match req.direction {
                    SplitDirection::Horizontal => target_rect.cols,
                    SplitDirection::Vertical => target_rect.rows,
                };
                (axis as u32 * pct.min(100) as u32 / 100) as u16
            }
        });

        let mut plan = window.layout().clone();
        plan.split(target, pane_id, req.direction, req.before, area, cells)?;
        let rect = plan
            .rect_of(pane_id, area)
            .ok_or_else(|| CommandError::PaneNotFound(pane_id.to_string()))?;

        let spawned = self.spawn_pane(SpawnRequest {
            session: session_id,
            window: window_id,
            pane: pane_id,
            rect,
            cwd: req.cwd.as_deref(),
            command: req.command.as_deref(),
            client: origin.client,
        })?;

        let Some(window) = model.window_mut(window_id) else {
            self.ptys.kill(pane_id);
            return Err(CommandError::WindowNotFound(window_id.to_string()));
        };
        let resized = window.insert_split(spawned.pane, plan);
        if !req.detached {
            window.set_active_pane(pane_id);
        }
        self.resize_ptys(&resized);
        info!(pane_id = %pane_id, target = %target, direction = ?req.direction, "pane split");

        self.emit(HookEvent::PaneCreated {
            session: session_id,
            window: window_id,
            pane: pane_id,
        });
        self.sync_clients(model, session_id);
        Ok(if req.print {
            CommandOutput::line(pane_id.to_string())
        } else {
            CommandOutput::empty()
        })
    }

    pub(super) fn kill_pane(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        target: Option<String>,
        others: bool,
    ) -> Reply {
        let (session_id, window_id, pane_id) = self.resolver(model, origin).pane(target.as_deref())?;
        if !others {
            self.destroy_pane(model, session_id, window_id, pane_id)?;
            return Ok(CommandOutput::empty());
        }

        let victims: Vec<PaneId> = model
            .window_mut(window_id)
            .map(|w| w.pane_ids())
            .unwrap_or_default()
            .into_iter()
            .filter(|id| *id != pane_id)
            .collect();
        for victim in victims {
            self.destroy_pane(model, session_id, window_id, victim)?;
        }
        Ok(CommandOutput::empty())
    }

    pub(super) fn select_pane(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        target: Option<String>,
        direction: Option<Direction>,
        last: bool,
    ) -> Reply {
        let (session_id, window_id, pane_id) = self.resolver(model, origin).pane(target.as_deref())?;
        let window = model
            .window_mut(window_id)
            .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;

        let selected = if last {
            window
                .last_pane_id()
                .ok_or_else(|| CommandError::PaneNotFound("no last pane".into()))?
        } else if let Some(direction) = direction {
            match window.neighbor(pane_id, direction) {
                Some(id) => id,
                None => return Ok(CommandOutput::empty()),
            }
        } else {
            pane_id
        };
        window.set_active_pane(selected);
        if let Some(session) = model.session_mut(session_id) {
            session.select_window(window_id);
        }
        self.sync_clients(model, session_id);
        Ok(CommandOutput::empty())
    }

    pub(super) fn swap_pane(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        source: Option<String>,
        target: Option<String>,
        neighbour: Option<bool>,
        detached: bool,
    ) -> Reply {
        let resolver = self.resolver(model, origin);
        let (session_id, window_id, dst) = resolver.pane(target.as_deref())?;
        let src = match (neighbour, source.as_deref()) {
            (Some(next), _) => {
                let window = model
                    .find_window(window_id)
                    .map(|(_, w)| w)
                    .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;
                step_pane(window, dst, next)
            }
            (None, Some(source)) => {
                let (_, src_window, src) = resolver.pane(Some(source))?;
                if src_window != window_id {
                    return Err(CommandError::InvalidArgument(
                        "swap-pane: panes must be in the same window".into(),
                    ));
                }
                src
            }
            (None, None) => {
                let window = model
                    .find_window(window_id)
                    .map(|(_, w)| w)
                    .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;
                window.last_pane_id().unwrap_or(dst)
            }
        };
        if src == dst {
            return Ok(CommandOutput::empty());
        }

        let window = model
            .window_mut(window_id)
            .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;
        let resized = window.swap_panes(src, dst)?;
        if !detached {
            window.set_active_pane(src);
        }
        self.resize_ptys(&resized);
        self.sync_clients(model, session_id);
        Ok(CommandOutput::empty())
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn resize_pane(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        target: Option<String>,
        direction: Option<Direction>,
        amount: u16,
        width: Option<u16>,
        height: Option<u16>,
    ) -> Reply {
        let (session_id, window_id, pane_id) = self.resolver(model, origin).pane(target.as_deref())?;
        let window = model
            .window_mut(window_id)
            .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;
        let rect = window
            .pane(pane_id)
            .map(Pane::rect)
            .ok_or_else(|| CommandError::PaneNotFound(pane_id.to_string()))?;

        let mut moves = Vec::new();
        if let Some(width) = width {
            moves.push((SplitDirection::Horizontal, width as i32 - rect.cols as i32));
        }
        if let Some(height) = height {
            moves.push((SplitDirection::Vertical, height as i32 - rect.rows as i32));
        }
        if let Some(direction) = direction {
            moves.push(border_move(window, pane_id, direction, amount as i32));
        }

        let mut resized = Vec::new();
        for (axis, delta) in moves.into_iter().filter(|(_, d)| *d != 0) {
            if let Some(changed) = window.adjust_pane(pane_id, axis, delta)? {
                resized.extend(changed);
            }
        }
        if resized.is_empty() {
            return Ok(CommandOutput::empty());
        }
        self.resize_ptys(&resized);
        self.send_layout(model, session_id);
        Ok(CommandOutput::empty())
    }

    pub(super) fn select_layout(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        target: Option<String>,
        preset: LayoutPreset,
    ) -> Reply {
        let (session_id, window_id) = self.resolver(model, origin).window(target.as_deref())?;
        let window = model
            .window_mut(window_id)
            .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;
        let resized = window.select_layout(preset);
        debug!(window_id = %window_id, layout = %preset, "layout selected");
        self.resize_ptys(&resized);
        self.send_layout(model, session_id);
        Ok(CommandOutput::empty())
    }

    pub(super) fn list_panes(
        &self,
        model: &SessionManager,
        origin: &Origin,
        target: Option<String>,
        scope: ListScope,
    ) -> Reply {
        let resolver = self.resolver(model, origin);
        let windows: Vec<(&str, &Window)> = match scope {
            ListScope::Server => model
                .sessions()
                .flat_map(|s| s.windows().map(move |w| (s.name(), w)))
                .collect(),
            ListScope::Session => {
                let session_id = resolver.session(target.as_deref())?;
                model
                    .session(session_id)
                    .into_iter()
                    .flat_map(|s| s.windows().map(move |w| (s.name(), w)))
                    .collect()
            }
            ListScope::Window => {
                let (_, window_id) = resolver.window(target.as_deref())?;
                model
                    .find_window(window_id)
                    .map(|(s, w)| (s.name(), w))
                    .into_iter()
                    .collect()
            }
        };

        let mut lines = Vec::new();
        for (session_name, window) in windows {
            let base = self.pane_base(window.session_id(), window.id());
            for info in window.pane_infos(base) {
                let mut line = format!(
                    "{}: [{}x{}] {}",
                    info.index, info.rect.cols, info.rect.rows, info.id
                );
                if info.active {
                    line.push_str(" (active)");
                }
                if !matches!(info.state, weft_protocol::PaneState::Running) {
                    line.push_str(" (dead)");
                }
                lines.push(match scope {
                    ListScope::Window => line,
                    _ => format!("{}:{}.{}", session_name, window.index(), line),
                });
            }
        }
        Ok(CommandOutput::lines(lines))
    }

    pub(super) fn resize_window(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        target: Option<String>,
        width: Option<u16>,
        height: Option<u16>,
        automatic: bool,
    ) -> Reply {
        let (session_id, window_id) = self.resolver(model, origin).window(target.as_deref())?;
        if automatic {
            self.options
                .unset("window-size", ScopeTarget::Window(window_id))?;
            self.fit_session(model, session_id);
        } else {
            self.options.set(
                "window-size",
                OptionValue::String("manual".into()),
                ScopeTarget::Window(window_id),
            )?;
            let window = model
                .window_mut(window_id)
                .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;
            let (cols, rows) = window.size();
            let size = Dimensions::new(width.unwrap_or(cols), height.unwrap_or(rows)).clamped();
            let resized = window.resize(size.cols, size.rows);
            self.resize_ptys(&resized);
        }
        self.send_layout(model, session_id);
        Ok(CommandOutput::empty())
    }

    pub(super) fn send_keys(
        &mut self,
        model: &SessionManager,
        origin: &Origin,
        target: Option<String>,
        literal: bool,
        keys: Vec<String>,
    ) -> Reply {
        let (_, _, pane_id) = self.resolver(model, origin).pane(target.as_deref())?;
        let bytes = encode_keys(&keys, literal);
        if bytes.is_empty() {
            return Ok(CommandOutput::empty());
        }
        let input = model
            .find_pane(pane_id)
            .and_then(|(_, _, pane)| pane.input())
            .ok_or_else(|| CommandError::InvalidArgument(format!("pane {} is dead", pane_id)))?;
        input.try_send(bytes).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => {
                CommandError::Resource(format!("pane {} input queue full", pane_id))
            }
            tokio::sync::mpsc::error::TrySendError::Closed(_) => {
                CommandError::InvalidArgument(format!("pane {} is dead", pane_id))
            }
        })?;
        Ok(CommandOutput::empty())
    }

    /// The process behind a pane ended
    pub(super) fn pane_exited(&mut self, model: &mut SessionManager, pane_id: PaneId, status: Option<i32>) -> Reply {
        let Some((session_id, window_id)) = model.locate_pane(pane_id) else {
            debug!(pane_id = %pane_id, "exit for unknown pane");
            return Ok(CommandOutput::empty());
        };
        self.ptys.remove(pane_id);
        info!(pane_id = %pane_id, ?status, "pane process exited");
        self.registry
            .try_broadcast_to_session(session_id, ServerMessage::PaneExited { pane_id, status });

        let target = OptionTarget::pane(session_id, window_id, pane_id);
        if self.options.flag("remain-on-exit", target) {
            if let Some(pane) = model.pane_mut(pane_id) {
                pane.mark_exited(status);
                let notice = match status {
                    Some(code) => format!("\r\nPane is dead (status {})\r\n", code),
                    None => "\r\nPane is dead\r\n".to_string(),
                };
                pane.terminal().lock().inject(&notice);
            }
            self.emit(HookEvent::PaneDied {
                session: session_id,
                window: window_id,
                pane: pane_id,
                status,
            });
            self.send_layout(model, session_id);
        } else {
            self.destroy_pane(model, session_id, window_id, pane_id)?;
            self.emit(HookEvent::PaneExited {
                session: session_id,
                window: window_id,
                pane: pane_id,
                status,
            });
        }
        Ok(CommandOutput::empty())
    }
}

/// Pane before (`next` false) or after `pane` in layout order, wrapping
fn step_pane(window: &Window, pane: PaneId, next: bool) -> PaneId {
    let ids = window.pane_ids();
    let Some(pos) = ids.iter().position(|id| *id == pane) else {
        return pane;
    };
    let len = ids.len();
    if next {
        ids[(pos + 1) % len]
    } else {
        ids[(pos + len - 1) % len]
    }
}

/// Axis and growth for moving a pane border towards `direction`. The
/// border shared with the right or lower neighbour moves if there is one,
/// otherwise the opposite border.
fn border_move(window: &Window, pane: PaneId, direction: Direction, amount: i32) -> (SplitDirection, i32) {
    let (axis, far_side, towards_far) = match direction {
        Direction::Left => (SplitDirection::Horizontal, Direction::Right, false),
        Direction::Right => (SplitDirection::Horizontal, Direction::Right, true),
        Direction::Up => (SplitDirection::Vertical, Direction::Down, false),
        Direction::Down => (SplitDirection::Vertical, Direction::Down, true),
    };
    let has_far = window.neighbor(pane, far_side).is_some();
    let grow = has_far == towards_far;
    (axis, if grow { amount } else { -amount })
}

#[cfg(test)]
mod tests {
    use super::super::exec::tests::{drain, Fixture};
    use super::*;
    use crate::commands::Command;
    use weft_protocol::{AccessMode, Rect};

    fn rects(fx: &Fixture) -> Vec<Rect> {
        let window = fx.model.session(fx.session).unwrap().window(fx.window).unwrap();
        window.panes().iter().map(|p| p.rect()).collect()
    }

    fn covered(rects: &[Rect]) -> u32 {
        rects.iter().map(Rect::area).sum()
    }

    // ==================== Split Tests ====================

    #[test]
    fn test_split_too_small_starts_nothing() {
        let mut fx = Fixture::new("");
        fx.run_argv(&["resize-window", "-x", "1"], Origin::server())
            .unwrap();
        let err = fx
            .run_argv(&["split-window", "-h"], Origin::server())
            .unwrap_err();
        assert!(matches!(err, CommandError::Resource(ref m) if m.contains("no space")), "{}", err);
        assert_eq!(fx.executor.ptys.count(), 0);
        let window = fx.model.session(fx.session).unwrap().window(fx.window).unwrap();
        assert_eq!(window.pane_ids(), vec![fx.pane]);
    }

    #[tokio::test]
    async fn test_split_commits_planned_layout() {
        let mut fx = Fixture::new("");
        let out = fx
            .run_argv(&["split-window", "-hdP", "sleep 5"], Origin::server())
            .unwrap();
        let window = fx.model.session(fx.session).unwrap().window(fx.window).unwrap();
        let new_pane = window.pane_ids()[1];
        assert_eq!(out.lines, vec![new_pane.to_string()]);
        assert_eq!(window.active_pane_id(), fx.pane);
        assert_eq!(window.pane(fx.pane).unwrap().rect(), Rect::new(0, 0, 40, 24));
        assert_eq!(window.pane(new_pane).unwrap().rect(), Rect::new(40, 0, 40, 24));
        assert_eq!(fx.executor.ptys.count(), 1);

        fx.run_argv(&["kill-pane", "-t", &new_pane.to_string()], Origin::server())
            .unwrap();
        assert_eq!(fx.executor.ptys.count(), 0);
    }

    // ==================== Kill Tests ====================

    #[test]
    fn test_kill_pane_retiles_window() {
        let mut fx = Fixture::new("");
        let second = fx.add_pane();
        let third = fx.add_pane();
        assert_eq!(covered(&rects(&fx)), 80 * 24);

        fx.run_argv(&["kill-pane", "-t", &second.to_string()], Origin::server())
            .unwrap();
        let remaining = rects(&fx);
        assert_eq!(remaining.len(), 2);
        assert_eq!(covered(&remaining), 80 * 24);
        let window = fx.model.session(fx.session).unwrap().window(fx.window).unwrap();
        assert!(window.contains(third));
        assert!(!window.contains(second));
    }

    #[test]
    fn test_kill_pane_others() {
        let mut fx = Fixture::new("");
        fx.add_pane();
        fx.add_pane();
        fx.run_argv(&["kill-pane", "-a", "-t", &fx.pane.to_string()], Origin::server())
            .unwrap();
        let window = fx.model.session(fx.session).unwrap().window(fx.window).unwrap();
        assert_eq!(window.pane_ids(), vec![fx.pane]);
        assert_eq!(window.pane(fx.pane).unwrap().rect(), Rect::new(0, 0, 80, 24));
    }

    #[tokio::test]
    async fn test_kill_last_pane_closes_window() {
        let mut fx = Fixture::new("");
        fx.run_argv(&["set-option", "-g", "exit-empty", "off"], Origin::server())
            .unwrap();
        fx.run_argv(&["kill-pane"], Origin::server()).unwrap();
        assert!(fx.model.session(fx.session).is_none());
        assert!(!fx.executor.shutdown.is_cancelled());
    }

    // ==================== Selection Tests ====================

    #[test]
    fn test_select_pane_direction_and_last() {
        let mut fx = Fixture::new("");
        let right = fx.add_pane();
        fx.run_argv(&["select-pane", "-t", &fx.pane.to_string()], Origin::server())
            .unwrap();
        fx.run_argv(&["select-pane", "-R"], Origin::server()).unwrap();
        let active = |fx: &Fixture| {
            fx.model
                .session(fx.session)
                .unwrap()
                .window(fx.window)
                .unwrap()
                .active_pane_id()
        };
        assert_eq!(active(&fx), right);
        fx.run_argv(&["select-pane", "-l"], Origin::server()).unwrap();
        assert_eq!(active(&fx), fx.pane);
    }

    #[test]
    fn test_swap_pane_with_next() {
        let mut fx = Fixture::new("");
        let right = fx.add_pane();
        fx.run_argv(&["select-pane", "-t", &fx.pane.to_string()], Origin::server())
            .unwrap();
        fx.run_argv(&["swap-pane", "-D"], Origin::server()).unwrap();
        let window = fx.model.session(fx.session).unwrap().window(fx.window).unwrap();
        assert_eq!(window.pane_ids(), vec![right, fx.pane]);
    }

    // ==================== Resize Tests ====================

    #[test]
    fn test_resize_pane_width() {
        let mut fx = Fixture::new("");
        let right = fx.add_pane();
        fx.run_argv(
            &["resize-pane", "-t", &fx.pane.to_string(), "-x", "30"],
            Origin::server(),
        )
        .unwrap();
        let window = fx.model.session(fx.session).unwrap().window(fx.window).unwrap();
        assert_eq!(window.pane(fx.pane).unwrap().rect().cols, 30);
        assert_eq!(window.pane(right).unwrap().rect().cols, 50);
    }

    #[test]
    fn test_resize_pane_moves_border_left() {
        let mut fx = Fixture::new("");
        let right = fx.add_pane();
        let before = rects(&fx);
        fx.run_argv(
            &["resize-pane", "-L", "-t", &right.to_string(), "5"],
            Origin::server(),
        )
        .unwrap();
        let window = fx.model.session(fx.session).unwrap().window(fx.window).unwrap();
        assert_eq!(window.pane(fx.pane).unwrap().rect().cols, before[0].cols - 5);
        assert_eq!(window.pane(right).unwrap().rect().cols, before[1].cols + 5);
    }

    #[test]
    fn test_select_layout_even_vertical() {
        let mut fx = Fixture::new("");
        fx.add_pane();
        fx.run_argv(&["select-layout", "even-vertical"], Origin::server())
            .unwrap();
        for rect in rects(&fx) {
            assert_eq!(rect.cols, 80);
        }
    }

    // ==================== Listing Tests ====================

    #[test]
    fn test_list_panes() {
        let mut fx = Fixture::new("");
        let right = fx.add_pane();
        let out = fx.run_argv(&["list-panes"], Origin::server()).unwrap();
        assert_eq!(out.lines.len(), 2);
        assert!(out.lines[0].starts_with(&format!("0: [40x24] {}", fx.pane)), "{}", out.lines[0]);
        assert!(out.lines[1].contains(&right.to_string()));

        let out = fx.run_argv(&["list-panes", "-a"], Origin::server()).unwrap();
        assert!(out.lines[0].starts_with("work:0.0: "), "{}", out.lines[0]);
    }

    // ==================== Input Tests ====================

    #[test]
    fn test_send_keys_to_dead_pane() {
        let mut fx = Fixture::new("");
        let err = fx
            .run_argv(&["send-keys", "echo", "Enter"], Origin::server())
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_send_keys_writes_to_pane_input() {
        use tokio::io::{duplex, AsyncReadExt};

        let mut fx = Fixture::new("");
        let (_pty_out, pane_out) = duplex(256);
        let (pane_in, mut pty_in) = duplex(256);
        let terminal = std::sync::Arc::clone(fx.model.pane_mut(fx.pane).unwrap().terminal());
        let io = crate::pane_io::PaneIo::start(terminal, pane_out, pane_in, None, |_| {});
        fx.model.pane_mut(fx.pane).unwrap().attach_io(io, None);

        fx.run_argv(&["send-keys", "ls", "Enter"], Origin::server()).unwrap();
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(std::time::Duration::from_secs(2), pty_in.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"ls\r");
    }

    // ==================== Exit Tests ====================

    #[tokio::test]
    async fn test_pane_exit_removes_pane() {
        let mut fx = Fixture::new("");
        let right = fx.add_pane();
        let (client, mut rx) = fx.connect(AccessMode::ReadWrite, 80, 24);
        fx.attach(client).unwrap();
        drain(&mut rx);

        fx.run(
            Command::PaneExited {
                pane: right,
                status: Some(0),
            },
            Origin::server(),
        )
        .unwrap();
        let window = fx.model.session(fx.session).unwrap().window(fx.window).unwrap();
        assert_eq!(window.pane_ids(), vec![fx.pane]);
        let msgs = drain(&mut rx);
        assert!(matches!(
            msgs[0],
            ServerMessage::PaneExited { pane_id, status: Some(0) } if pane_id == right
        ));
    }

    #[test]
    fn test_pane_exit_with_remain_on_exit() {
        let mut fx = Fixture::new("");
        fx.run_argv(&["set-option", "-g", "remain-on-exit", "on"], Origin::server())
            .unwrap();
        fx.run(
            Command::PaneExited {
                pane: fx.pane,
                status: Some(2),
            },
            Origin::server(),
        )
        .unwrap();
        let window = fx.model.session(fx.session).unwrap().window(fx.window).unwrap();
        let pane = window.pane(fx.pane).unwrap();
        assert!(!pane.is_running());
        let snapshot = pane.terminal().lock().snapshot();
        assert!((0..24).any(|row| snapshot.row_text(row).contains("Pane is dead (status 2)")));

        let out = fx.run_argv(&["list-panes"], Origin::server()).unwrap();
        assert!(out.lines[0].ends_with("(dead)"));
    }

    #[test]
    fn test_exit_of_unknown_pane_ignored() {
        let mut fx = Fixture::new("");
        fx.run(
            Command::PaneExited {
                pane: PaneId(99),
                status: None,
            },
            Origin::server(),
        )
        .unwrap();
        assert_eq!(fx.model.pane_ids(), vec![fx.pane]);
    }
}
