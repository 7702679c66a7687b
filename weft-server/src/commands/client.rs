//! Attaching, detaching and sizing clients

use tracing::info;
use weft_protocol::{Dimensions, ExitReason, ServerMessage, SessionId};

use crate::hooks::HookEvent;
use crate::options::OptionTarget;
use crate::registry::ClientId;
use crate::session::SessionManager;

use super::session::NewSession;
use super::{CommandError, CommandOutput, Executor, Origin, Reply};

impl Executor {
    /// Attach the submitting client to a session, creating it if asked to
    pub(super) fn attach(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        target: Option<String>,
        create: bool,
    ) -> Reply {
        let client = origin
            .client
            .ok_or_else(|| CommandError::InvalidArgument("no client to attach".into()))?;
        let session_id = match self.resolver(model, origin).session(target.as_deref()) {
            Ok(id) => id,
            Err(CommandError::SessionNotFound(_)) if create => {
                if !origin.access.can_write() {
                    return Err(CommandError::PermissionDenied(
                        "read-only clients cannot create sessions".into(),
                    ));
                }
                self.create_session(
                    model,
                    origin,
                    NewSession {
                        name: target,
                        ..NewSession::default()
                    },
                )?
            }
            Err(e) => return Err(e),
        };
        self.attach_client(model, client, session_id)?;
        Ok(CommandOutput::empty())
    }

    /// Attach `client` to `session_id`, leaving its previous session. The
    /// client gets a full screen of the active pane, then the session
    /// description, then deltas.
    pub(super) fn attach_client(
        &mut self,
        model: &mut SessionManager,
        client: ClientId,
        session_id: SessionId,
    ) -> Result<(), CommandError> {
        let has_window = model
            .session(session_id)
            .ok_or_else(|| CommandError::SessionNotFound(session_id.to_string()))?
            .current_window()
            .is_some();
        if !has_window {
            return Err(CommandError::WindowNotFound(format!("{}: no windows", session_id)));
        }

        if let Some(old) = self.registry.client_session(client) {
            self.unsubscribe(model, client);
            self.registry.detach_from_session(client);
            if old != session_id {
                self.client_left(model, old, client);
            }
        }
        if !self.registry.attach_to_session(client, session_id) {
            return Err(CommandError::Resource(format!("client {} is gone", client)));
        }
        let count = self.registry.session_client_count(session_id);
        if let Some(session) = model.session_mut(session_id) {
            session.set_attached(count);
        }
        let resized = self.fit_session(model, session_id);

        let Some(session) = model.session(session_id) else {
            return Err(CommandError::SessionNotFound(session_id.to_string()));
        };
        if let Some(pane_id) = session.current_window().map(|w| w.active_pane_id()) {
            self.subscribe(model, client, pane_id);
        }
        if let Some((info, window, panes)) = self.describe(session) {
            self.registry.try_send_to_client(
                client,
                ServerMessage::Attached {
                    session: info,
                    window,
                    panes,
                },
            );
        }
        if resized {
            self.send_layout(model, session_id);
        }
        info!(client_id = client, session_id = %session_id, "client attached");
        self.emit(HookEvent::ClientAttached {
            client,
            session: session_id,
        });
        Ok(())
    }

    /// Bookkeeping after a client left a session. The registry entry has
    /// already been detached.
    pub(super) fn client_left(&mut self, model: &mut SessionManager, session_id: SessionId, client: ClientId) {
        let count = self.registry.session_client_count(session_id);
        let Some(session) = model.session_mut(session_id) else {
            return;
        };
        session.set_attached(count);
        let destroy = count == 0
            && (session.is_empty()
                || self
                    .options
                    .flag("destroy-unattached", OptionTarget::session(session_id)));
        info!(client_id = client, session_id = %session_id, remaining = count, "client detached");
        self.emit(HookEvent::ClientDetached {
            client,
            session: session_id,
        });

        if destroy {
            self.destroy_session(model, session_id, ExitReason::SessionClosed);
        } else if count > 0 && self.fit_session(model, session_id) {
            self.send_layout(model, session_id);
        }
    }

    pub(super) fn client_resized(&mut self, model: &mut SessionManager, client: ClientId, cols: u16, rows: u16) -> Reply {
        let size = Dimensions::new(cols, rows).clamped();
        self.registry.set_size(client, size);
        self.emit(HookEvent::ClientResized {
            client,
            cols: size.cols,
            rows: size.rows,
        });
        if let Some(session_id) = self.registry.client_session(client) {
            if self.fit_session(model, session_id) {
                self.send_layout(model, session_id);
            }
        }
        Ok(CommandOutput::empty())
    }

    fn find_client(&self, name: &str) -> Result<ClientId, CommandError> {
        let by_id = name.parse::<ClientId>().ok().filter(|id| self.registry.contains(*id));
        by_id
            .or_else(|| {
                self.registry.client_ids().into_iter().find(|id| {
                    self.registry
                        .get_client(*id)
                        .is_some_and(|c| c.name == name)
                })
            })
            .ok_or_else(|| CommandError::InvalidArgument(format!("can't find client: {}", name)))
    }

    pub(super) fn detach_client(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        client: Option<String>,
        session: Option<String>,
        others: bool,
    ) -> Reply {
        let current = || {
            origin
                .client
                .ok_or_else(|| CommandError::InvalidArgument("no current client".into()))
        };
        let targets: Vec<ClientId> = if let Some(session) = session {
            let session_id = self.resolver(model, origin).session(Some(&session))?;
            self.registry.session_clients(session_id)
        } else if others {
            let me = current()?;
            self.registry
                .client_ids()
                .into_iter()
                .filter(|id| *id != me && self.registry.client_session(*id).is_some())
                .collect()
        } else {
            vec![match client {
                Some(name) => self.find_client(&name)?,
                None => current()?,
            }]
        };

        if !origin.access.can_write() && targets.iter().any(|id| Some(*id) != origin.client) {
            return Err(CommandError::PermissionDenied(
                "read-only clients may only detach themselves".into(),
            ));
        }

        for id in targets {
            self.unsubscribe(model, id);
            let Some((session_id, _)) = self.registry.detach_from_session(id) else {
                continue;
            };
            self.registry.try_send_to_client(
                id,
                ServerMessage::Exit {
                    reason: ExitReason::Detached,
                },
            );
            self.client_left(model, session_id, id);
        }
        Ok(CommandOutput::empty())
    }

    pub(super) fn list_clients(&self, model: &SessionManager, origin: &Origin, target: Option<String>) -> Reply {
        let only = match target {
            Some(target) => Some(self.resolver(model, origin).session(Some(&target))?),
            None => None,
        };
        let mut lines = Vec::new();
        for id in self.registry.client_ids() {
            let Some(entry) = self.registry.get_client(id) else {
                continue;
            };
            let Some(session_id) = entry.session else {
                continue;
            };
            if only.is_some_and(|s| s != session_id) {
                continue;
            }
            let session_name = model.session(session_id).map(|s| s.name()).unwrap_or("");
            lines.push(format!(
                "{}: {} [{}x{}] ({})",
                entry.name,
                session_name,
                entry.size.cols,
                entry.size.rows,
                if entry.access.can_write() { "rw" } else { "ro" }
            ));
        }
        Ok(CommandOutput::lines(lines))
    }

    pub(super) fn kill_server(&mut self, model: &mut SessionManager) -> Reply {
        info!("kill-server requested");
        self.shutdown_server();
        for session_id in model.session_ids() {
            self.destroy_session(model, session_id, ExitReason::ServerExited);
        }
        Ok(CommandOutput::empty())
    }
}
