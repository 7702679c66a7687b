//! Window commands

use tracing::info;
use weft_protocol::{Rect, WindowId};

use crate::hooks::HookEvent;
use crate::options::{OptionTarget, OptionValue, ScopeTarget};
use crate::session::{Session, SessionManager, Window};

use super::exec::SpawnRequest;
use super::{CommandError, CommandOutput, Executor, Origin, Reply, WindowStep};

#[derive(Debug, Default)]
pub(super) struct NewWindow {
    pub target: Option<String>,
    pub name: Option<String>,
    pub detached: bool,
    pub print: bool,
    pub cwd: Option<String>,
    pub command: Option<String>,
}

impl Executor {
    pub(super) fn new_window(&mut self, model: &mut SessionManager, origin: &Origin, req: NewWindow) -> Reply {
        let session_id = self.resolver(model, origin).session(req.target.as_deref())?;
        let session = model
            .session(session_id)
            .ok_or_else(|| CommandError::SessionNotFound(session_id.to_string()))?;
        let base = self
            .options
            .number("base-index", OptionTarget::session(session_id))
            .max(0) as u32;
        let index = session.next_index(base);
        let (cols, rows) = session.size();

        let window_id = model.alloc_window_id();
        let pane_id = model.alloc_pane_id();
        let spawned = self.spawn_pane(SpawnRequest {
            session: session_id,
            window: window_id,
            pane: pane_id,
            rect: Rect::new(0, 0, cols, rows),
            cwd: req.cwd.as_deref(),
            command: req.command.as_deref(),
            client: origin.client,
        })?;

        if req.name.is_some() {
            self.options.set(
                "automatic-rename",
                OptionValue::Flag(false),
                ScopeTarget::Window(window_id),
            )?;
        }
        let name = req.name.unwrap_or(spawned.name);
        let window = Window::new(window_id, session_id, index, name, spawned.pane, cols, rows);
        let session = model
            .session_mut(session_id)
            .ok_or_else(|| CommandError::SessionNotFound(session_id.to_string()))?;
        session.add_window(window);
        if !req.detached {
            session.select_window(window_id);
        }
        let session_name = session.name().to_string();
        info!(window_id = %window_id, session_id = %session_id, index, "window created");

        self.emit(HookEvent::WindowCreated {
            session: session_id,
            window: window_id,
        });
        self.emit(HookEvent::PaneCreated {
            session: session_id,
            window: window_id,
            pane: pane_id,
        });
        self.sync_clients(model, session_id);

        Ok(if req.print {
            CommandOutput::line(format!("{}:{}", session_name, index))
        } else {
            CommandOutput::empty()
        })
    }

    pub(super) fn kill_window(&mut self, model: &mut SessionManager, origin: &Origin, target: Option<String>) -> Reply {
        let (session_id, window_id) = self.resolver(model, origin).window(target.as_deref())?;
        self.destroy_window(model, session_id, window_id);
        Ok(CommandOutput::empty())
    }

    pub(super) fn rename_window(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        target: Option<String>,
        name: String,
    ) -> Reply {
        let (session_id, window_id) = self.resolver(model, origin).window(target.as_deref())?;
        let window = model
            .window_mut(window_id)
            .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;
        window.set_name(name.clone());
        self.options.set(
            "automatic-rename",
            OptionValue::Flag(false),
            ScopeTarget::Window(window_id),
        )?;
        self.emit(HookEvent::WindowRenamed {
            session: session_id,
            window: window_id,
            name,
        });
        self.send_layout(model, session_id);
        Ok(CommandOutput::empty())
    }

    pub(super) fn select_window(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        target: Option<String>,
        step: WindowStep,
    ) -> Reply {
        let (session_id, window_id) = match step {
            WindowStep::Target => self.resolver(model, origin).window(target.as_deref())?,
            _ => {
                let session_id = self.resolver(model, origin).session(target.as_deref())?;
                let session = model
                    .session(session_id)
                    .ok_or_else(|| CommandError::SessionNotFound(session_id.to_string()))?;
                (session_id, step_window(session, step)?)
            }
        };
        let session = model
            .session_mut(session_id)
            .ok_or_else(|| CommandError::SessionNotFound(session_id.to_string()))?;
        session.select_window(window_id);
        self.sync_clients(model, session_id);
        Ok(CommandOutput::empty())
    }

    pub(super) fn list_windows(
        &self,
        model: &SessionManager,
        origin: &Origin,
        target: Option<String>,
        all: bool,
    ) -> Reply {
        let sessions: Vec<&Session> = if all {
            model.sessions().collect()
        } else {
            let session_id = self.resolver(model, origin).session(target.as_deref())?;
            model.session(session_id).into_iter().collect()
        };

        let mut lines = Vec::new();
        for session in sessions {
            let current = session.current_window_id();
            let last = session.last_window_id();
            for window in session.windows() {
                let flag = if Some(window.id()) == current {
                    "*"
                } else if Some(window.id()) == last {
                    "-"
                } else {
                    ""
                };
                let (cols, rows) = window.size();
                let line = format!(
                    "{}: {}{} ({} panes) [{}x{}] {}",
                    window.index(),
                    self.display_name(session.id(), window),
                    flag,
                    window.pane_count(),
                    cols,
                    rows,
                    window.id()
                );
                lines.push(if all {
                    format!("{}:{}", session.name(), line)
                } else {
                    line
                });
            }
        }
        Ok(CommandOutput::lines(lines))
    }
}

/// Window `step` moves to, wrapping around at either end
fn step_window(session: &Session, step: WindowStep) -> Result<WindowId, CommandError> {
    let ids: Vec<WindowId> = session.windows().map(Window::id).collect();
    let current = session.current_window_id();
    let pos = ids.iter().position(|id| Some(*id) == current).unwrap_or(0);
    let found = match step {
        WindowStep::Last => session.last_window_id(),
        WindowStep::Next if !ids.is_empty() => Some(ids[(pos + 1) % ids.len()]),
        WindowStep::Previous if !ids.is_empty() => Some(ids[(pos + ids.len() - 1) % ids.len()]),
        _ => current,
    };
    found.ok_or_else(|| match step {
        WindowStep::Last => CommandError::WindowNotFound("no last window".into()),
        _ => CommandError::WindowNotFound(format!("{}: no windows", session.name())),
    })
}
