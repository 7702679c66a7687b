//! Session commands

use chrono::DateTime;
use tracing::info;
use weft_protocol::{Dimensions, ExitReason, Rect, SessionId};

use crate::hooks::HookEvent;
use crate::options::{OptionTarget, OptionValue, ScopeTarget};
use crate::session::{SessionManager, Window};

use super::exec::SpawnRequest;
use super::{CommandError, CommandOutput, Executor, Origin, Reply};

#[derive(Debug, Default)]
pub(super) struct NewSession {
    pub name: Option<String>,
    pub window_name: Option<String>,
    pub detached: bool,
    pub print: bool,
    pub cwd: Option<String>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub command: Option<String>,
}

impl Executor {
    pub(super) fn new_session(&mut self, model: &mut SessionManager, origin: &Origin, req: NewSession) -> Reply {
        let print = req.print;
        let detached = req.detached;
        let session_id = self.create_session(model, origin, req)?;

        if let (false, Some(client)) = (detached, origin.client) {
            self.attach_client(model, client, session_id)?;
        }
        if !print {
            return Ok(CommandOutput::empty());
        }
        let name = model
            .session(session_id)
            .map(|s| s.name().to_string())
            .unwrap_or_default();
        Ok(CommandOutput::line(format!("{}:", name)))
    }

    /// Create a session with one window. The session is removed again if
    /// its first pane cannot be started.
    pub(super) fn create_session(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        req: NewSession,
    ) -> Result<SessionId, CommandError> {
        let size = origin
            .client
            .and_then(|id| self.registry.get_client(id).map(|c| c.size))
            .unwrap_or(self.default_size);
        let Dimensions { cols, rows } = Dimensions::new(
            req.width.unwrap_or(size.cols),
            req.height.unwrap_or(size.rows),
        )
        .clamped();

        let session_id = model.create_session(req.name.as_deref(), cols, rows)?;
        let window_id = model.alloc_window_id();
        let pane_id = model.alloc_pane_id();

        let spawned = match self.spawn_pane(SpawnRequest {
            session: session_id,
            window: window_id,
            pane: pane_id,
            rect: Rect::new(0, 0, cols, rows),
            cwd: req.cwd.as_deref(),
            command: req.command.as_deref(),
            client: origin.client,
        }) {
            Ok(spawned) => spawned,
            Err(e) => {
                model.remove_session(session_id);
                return Err(e);
            }
        };

        let index = self
            .options
            .number("base-index", OptionTarget::session(session_id))
            .max(0) as u32;
        if req.window_name.is_some() {
            self.options.set(
                "automatic-rename",
                OptionValue::Flag(false),
                ScopeTarget::Window(window_id),
            )?;
        }
        let name = req.window_name.unwrap_or(spawned.name);
        let window = Window::new(window_id, session_id, index, name, spawned.pane, cols, rows);
        let session = model
            .session_mut(session_id)
            .ok_or_else(|| CommandError::SessionNotFound(session_id.to_string()))?;
        session.add_window(window);
        info!(session_id = %session_id, name = session.name(), "session created");

        self.emit(HookEvent::SessionCreated {
            session: session_id,
        });
        self.emit(HookEvent::WindowCreated {
            session: session_id,
            window: window_id,
        });
        self.emit(HookEvent::PaneCreated {
            session: session_id,
            window: window_id,
            pane: pane_id,
        });
        Ok(session_id)
    }

    pub(super) fn kill_session(&mut self, model: &mut SessionManager, origin: &Origin, target: Option<String>) -> Reply {
        let session_id = self.resolver(model, origin).session(target.as_deref())?;
        self.destroy_session(model, session_id, ExitReason::SessionClosed);
        Ok(CommandOutput::empty())
    }

    pub(super) fn rename_session(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        target: Option<String>,
        name: String,
    ) -> Reply {
        let session_id = self.resolver(model, origin).session(target.as_deref())?;
        if name.is_empty() {
            return Err(CommandError::InvalidArgument("empty session name".into()));
        }
        model.rename_session(session_id, &name)?;
        let name = model
            .session(session_id)
            .map(|s| s.name().to_string())
            .unwrap_or(name);
        self.emit(HookEvent::SessionRenamed {
            session: session_id,
            name,
        });
        self.send_layout(model, session_id);
        Ok(CommandOutput::empty())
    }

    pub(super) fn has_session(&self, model: &SessionManager, origin: &Origin, target: Option<String>) -> Reply {
        self.resolver(model, origin).session(target.as_deref())?;
        Ok(CommandOutput::empty())
    }

    pub(super) fn list_sessions(&self, model: &SessionManager) -> Reply {
        let lines = model
            .sessions()
            .map(|session| {
                let created = DateTime::from_timestamp(session.created_at() as i64, 0)
                    .map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
                    .unwrap_or_default();
                let (cols, rows) = session.size();
                let mut line = format!(
                    "{}: {} windows (created {}) [{}x{}]",
                    session.name(),
                    session.window_count(),
                    created,
                    cols,
                    rows
                );
                if session.attached() > 0 {
                    line.push_str(" (attached)");
                }
                line
            })
            .collect();
        Ok(CommandOutput::lines(lines))
    }
}
