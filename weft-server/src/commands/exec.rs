//! Command executor
//!
//! The executor is the only writer of the session tree. Command bodies live
//! in the per-topic modules next to this one; this file holds dispatch and
//! the operations they share: spawning panes, tearing down panes, windows
//! and sessions, sizing sessions to their clients and keeping attached
//! clients subscribed to the right pane.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weft_protocol::{
    Dimensions, ExitReason, PaneId, PaneInfo, Rect, ServerMessage, SessionId, SessionInfo,
    WindowId, WindowInfo,
};
use weft_utils::env;
use weft_utils::paths::SESSION_ENV;

use crate::hooks::{HookAction, HookEvent, HookKind, HookTable};
use crate::options::{OptionTarget, OptionTree, ScopeTarget};
use crate::pane_io::PaneIo;
use crate::pty::{PtyConfig, PtyManager};
use crate::registry::{ClientId, ClientRegistry};
use crate::session::{Pane, Session, SessionManager, Window};

use super::target::Resolver;
use super::{parse, Command, CommandError, CommandQueue, Origin, Reply};

/// Size used when no client says otherwise
pub const DEFAULT_SIZE: Dimensions = Dimensions { cols: 80, rows: 24 };

/// What to start in a new pane
pub(super) struct SpawnRequest<'a> {
    pub session: SessionId,
    pub window: WindowId,
    pub pane: PaneId,
    pub rect: Rect,
    pub cwd: Option<&'a str>,
    pub command: Option<&'a str>,
    /// Client whose environment is copied through `update-environment`
    pub client: Option<ClientId>,
}

/// A started pane and the name its window gets by default
pub(super) struct Spawned {
    pub pane: Pane,
    pub name: String,
}

pub struct Executor {
    pub(super) ptys: PtyManager,
    pub(super) hooks: HookTable,
    pub(super) options: Arc<OptionTree>,
    pub(super) registry: Arc<ClientRegistry>,
    queue: CommandQueue,
    socket_path: PathBuf,
    pub(super) shutdown: CancellationToken,
    pub(super) default_size: Dimensions,
    pending: Vec<HookEvent>,
}

impl Executor {
    pub fn new(
        options: Arc<OptionTree>,
        registry: Arc<ClientRegistry>,
        queue: CommandQueue,
        socket_path: PathBuf,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            ptys: PtyManager::new(),
            hooks: HookTable::new(),
            options,
            registry,
            queue,
            socket_path,
            shutdown,
            default_size: DEFAULT_SIZE,
            pending: Vec::new(),
        }
    }

    pub fn with_default_size(mut self, size: Dimensions) -> Self {
        self.default_size = size;
        self
    }

    /// Register an in-process hook action. Used before the worker starts;
    /// at runtime hooks change through `set-hook`.
    pub fn register_hook(&mut self, kind: HookKind, action: HookAction) {
        self.hooks.register(kind, action);
    }

    /// Run one command against the model
    pub fn execute(&mut self, model: &mut SessionManager, command: Command, origin: &Origin) -> Reply {
        match command {
            Command::NewSession {
                name,
                window_name,
                detached,
                print,
                cwd,
                width,
                height,
                command,
            } => self.new_session(
                model,
                origin,
                super::session::NewSession {
                    name,
                    window_name,
                    detached,
                    print,
                    cwd,
                    width,
                    height,
                    command,
                },
            ),
            Command::KillSession { target } => self.kill_session(model, origin, target),
            Command::RenameSession { target, name } => {
                self.rename_session(model, origin, target, name)
            }
            Command::HasSession { target } => self.has_session(model, origin, target),
            Command::ListSessions => self.list_sessions(model),
            Command::NewWindow {
                target,
                name,
                detached,
                print,
                cwd,
                command,
            } => self.new_window(
                model,
                origin,
                super::window::NewWindow {
                    target,
                    name,
                    detached,
                    print,
                    cwd,
                    command,
                },
            ),
            Command::KillWindow { target } => self.kill_window(model, origin, target),
            Command::RenameWindow { target, name } => {
                self.rename_window(model, origin, target, name)
            }
            Command::SelectWindow { target, step } => {
                self.select_window(model, origin, target, step)
            }
            Command::ListWindows { target, all } => self.list_windows(model, origin, target, all),
            Command::SplitWindow {
                target,
                direction,
                before,
                detached,
                print,
                size,
                cwd,
                command,
            } => self.split_window(
                model,
                origin,
                super::pane::SplitWindow {
                    target,
                    direction,
                    before,
                    detached,
                    print,
                    size,
                    cwd,
                    command,
                },
            ),
            Command::KillPane { target, others } => self.kill_pane(model, origin, target, others),
            Command::SelectPane {
                target,
                direction,
                last,
            } => self.select_pane(model, origin, target, direction, last),
            Command::SwapPane {
                source,
                target,
                neighbour,
                detached,
            } => self.swap_pane(model, origin, source, target, neighbour, detached),
            Command::ResizePane {
                target,
                direction,
                amount,
                width,
                height,
            } => self.resize_pane(model, origin, target, direction, amount, width, height),
            Command::SelectLayout { target, preset } => {
                self.select_layout(model, origin, target, preset)
            }
            Command::ListPanes { target, scope } => self.list_panes(model, origin, target, scope),
            Command::ResizeWindow {
                target,
                width,
                height,
                automatic,
            } => self.resize_window(model, origin, target, width, height, automatic),
            Command::SendKeys {
                target,
                literal,
                keys,
            } => self.send_keys(model, origin, target, literal, keys),
            Command::SetOption {
                scope,
                target,
                unset,
                name,
                value,
            } => self.set_option(model, origin, scope, target, unset, name, value),
            Command::ShowOptions {
                scope,
                target,
                name,
                value_only,
            } => self.show_options(model, origin, scope, target, name, value_only),
            Command::SetHook {
                kind,
                unset,
                append,
                command,
            } => self.set_hook(kind, unset, append, command),
            Command::ShowHooks => self.show_hooks(),
            Command::DetachClient {
                client,
                session,
                others,
            } => self.detach_client(model, origin, client, session, others),
            Command::ListClients { target } => self.list_clients(model, origin, target),
            Command::KillServer => self.kill_server(model),
            Command::Attach { target, create } => self.attach(model, origin, target, create),
            Command::ClientDetached { client, session } => {
                self.client_left(model, session, client);
                Ok(super::CommandOutput::empty())
            }
            Command::ClientResized { client, cols, rows } => {
                self.client_resized(model, client, cols, rows)
            }
            Command::PaneExited { pane, status } => self.pane_exited(model, pane, status),
        }
    }

    /// Run hooks for the events the last command produced. Hook commands
    /// are appended to the queue.
    pub fn flush_hooks(&mut self) {
        for event in std::mem::take(&mut self.pending) {
            for follow_up in self.hooks.dispatch(&event) {
                match parse(&follow_up.argv) {
                    Ok((_, command)) => {
                        debug!(hook = %event.kind(), command = command.name(), "queueing hook command");
                        self.queue
                            .push(command, Origin::hook(follow_up.event.session()));
                    }
                    Err(e) => warn!(hook = %event.kind(), error = %e, "invalid hook command"),
                }
            }
        }
    }

    pub(super) fn emit(&mut self, event: HookEvent) {
        self.pending.push(event);
    }

    /// Session relative targets resolve against
    pub(super) fn current_session(&self, origin: &Origin) -> Option<SessionId> {
        origin
            .client
            .and_then(|client| self.registry.client_session(client))
            .or(origin.session)
    }

    pub(super) fn resolver<'a>(&'a self, model: &'a SessionManager, origin: &Origin) -> Resolver<'a> {
        Resolver::new(model, &self.options, self.current_session(origin))
    }

    // ==================== Spawning ====================

    /// Start a process for a pane that is not in the model yet. Nothing is
    /// changed if this fails.
    pub(super) fn spawn_pane(&mut self, req: SpawnRequest<'_>) -> Result<Spawned, CommandError> {
        let target = OptionTarget::pane(req.session, req.window, req.pane);
        let history = self.options.number("history-limit", target).max(0) as usize;

        let mut shell = self.options.string("default-shell", target);
        if !env::check_shell(&shell, "weft-server") {
            shell = env::default_shell();
        }
        let default_command = self.options.string("default-command", target);
        let command = req
            .command
            .map(str::to_string)
            .or_else(|| (!default_command.is_empty()).then_some(default_command));

        let name = window_name_for(command.as_deref(), &shell);
        let mut config = match command {
            Some(cmd) => PtyConfig::shell_command(shell, cmd),
            None => PtyConfig::shell(shell),
        }
        .with_size(req.rect.cols, req.rect.rows)
        .with_env("TERM", self.options.string("default-terminal", target))
        .with_env(
            SESSION_ENV,
            format!(
                "{},{},{}",
                self.socket_path.display(),
                std::process::id(),
                req.session.0
            ),
        )
        .with_env("WEFT_PANE", req.pane.to_string())
        .without_env("COLUMNS")
        .without_env("LINES");

        let mut cwd = req.cwd.map(str::to_string);
        if let Some(client) = req.client.and_then(|id| self.registry.get_client(id)) {
            for var in self.options.array("update-environment", target) {
                if let Some(value) = client.env(&var) {
                    config = config.with_env(var.as_str(), value);
                }
            }
            if cwd.is_none() {
                cwd = client.env("PWD").map(str::to_string);
            }
        }
        if let Some(cwd) = cwd {
            config = config.with_cwd(cwd);
        }

        let allow_alternate = self.options.flag("alternate-screen", target);
        let queue = self.queue.clone();
        let pane_id = req.pane;

        let channel = self
            .ptys
            .spawn(req.pane, &config)
            .map_err(|e| CommandError::Resource(format!("create pane failed: {}", e)))?;

        let mut pane = Pane::new(req.pane, req.window, req.rect, history);
        pane.terminal()
            .lock()
            .grid_mut()
            .set_allow_alternate(allow_alternate);
        let io = PaneIo::start(
            Arc::clone(pane.terminal()),
            channel.reader(),
            channel.writer(),
            Some(channel.exit_watcher()),
            move |status| {
                queue.push(Command::PaneExited { pane: pane_id, status }, Origin::server());
            },
        );
        let pid = channel.pid();
        pane.attach_io(io, pid);
        info!(pane_id = %pane_id, ?pid, "pane started");
        Ok(Spawned { pane, name })
    }

    // ==================== Teardown ====================

    /// Remove a pane. Removing the last pane of a window removes the window.
    pub(super) fn destroy_pane(
        &mut self,
        model: &mut SessionManager,
        session_id: SessionId,
        window_id: WindowId,
        pane_id: PaneId,
    ) -> Result<(), CommandError> {
        let window = model
            .window_mut(window_id)
            .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;
        if window.pane_count() == 1 {
            self.destroy_window(model, session_id, window_id);
            return Ok(());
        }

        let (pane, resized) = window.remove_pane(pane_id)?;
        drop(pane);
        self.ptys.kill(pane_id);
        self.options.remove_scope(ScopeTarget::Pane(pane_id));
        self.resize_ptys(&resized);
        debug!(pane_id = %pane_id, "pane removed");
        self.sync_clients(model, session_id);
        Ok(())
    }

    /// Remove a window. A session left without windows is destroyed unless
    /// clients are still attached to it.
    pub(super) fn destroy_window(&mut self, model: &mut SessionManager, session_id: SessionId, window_id: WindowId) {
        let Some(session) = model.session_mut(session_id) else {
            return;
        };
        let Some(window) = session.remove_window(window_id) else {
            return;
        };
        for pane_id in window.pane_ids() {
            self.ptys.kill(pane_id);
            self.options.remove_scope(ScopeTarget::Pane(pane_id));
        }
        self.options.remove_scope(ScopeTarget::Window(window_id));
        drop(window);
        info!(window_id = %window_id, session_id = %session_id, "window closed");
        self.emit(HookEvent::WindowClosed {
            session: session_id,
            window: window_id,
        });

        if session.is_empty() && self.registry.session_client_count(session_id) == 0 {
            self.destroy_session(model, session_id, ExitReason::SessionClosed);
        } else {
            self.sync_clients(model, session_id);
        }
    }

    /// Remove a session, stop its panes and let its clients go
    pub(super) fn destroy_session(&mut self, model: &mut SessionManager, session_id: SessionId, reason: ExitReason) {
        let Some(session) = model.remove_session(session_id) else {
            return;
        };
        for window in session.windows() {
            for pane_id in window.pane_ids() {
                self.ptys.kill(pane_id);
                self.options.remove_scope(ScopeTarget::Pane(pane_id));
            }
            self.options.remove_scope(ScopeTarget::Window(window.id()));
        }
        self.options.remove_scope(ScopeTarget::Session(session_id));

        for client in self.registry.session_clients(session_id) {
            self.registry.detach_from_session(client);
            self.registry
                .try_send_to_client(client, ServerMessage::Exit { reason });
        }
        info!(session_id = %session_id, name = session.name(), "session closed");
        drop(session);
        self.emit(HookEvent::SessionClosed {
            session: session_id,
        });
        self.check_exit_empty(model);
    }

    /// Stop the server once the last session is gone, if `exit-empty` is on
    pub(super) fn check_exit_empty(&mut self, model: &SessionManager) {
        if self.shutdown.is_cancelled()
            || !model.is_empty()
            || !self.options.flag("exit-empty", OptionTarget::server())
        {
            return;
        }
        info!("no sessions left, shutting down");
        self.shutdown_server();
    }

    /// Let every client go and stop the server
    pub(super) fn shutdown_server(&mut self) {
        for client in self.registry.client_ids() {
            self.registry.detach_from_session(client);
            self.registry.try_send_to_client(
                client,
                ServerMessage::Exit {
                    reason: ExitReason::ServerExited,
                },
            );
        }
        self.ptys.kill_all();
        self.shutdown.cancel();
    }

    pub(super) fn resize_ptys(&self, resized: &[(PaneId, Rect)]) {
        for (pane_id, rect) in resized {
            if let Err(e) = self.ptys.resize(*pane_id, rect.cols, rect.rows) {
                debug!(pane_id = %pane_id, error = %e, "pty resize skipped");
            }
        }
    }

    // ==================== Client Fanout ====================

    /// Point `client` at `pane_id`: snapshot first, then deltas
    pub(super) fn subscribe(&self, model: &SessionManager, client: ClientId, pane_id: PaneId) {
        self.unsubscribe(model, client);
        let Some(sender) = self.registry.sender(client) else {
            return;
        };
        if let Some((_, _, pane)) = model.find_pane(pane_id) {
            pane.terminal().lock().subscribe(client, sender);
            self.registry.set_observed_pane(client, Some(pane_id));
        }
    }

    pub(super) fn unsubscribe(&self, model: &SessionManager, client: ClientId) {
        if let Some(old) = self.registry.observed_pane(client) {
            if let Some((_, _, pane)) = model.find_pane(old) {
                pane.terminal().lock().unsubscribe(client);
            }
            self.registry.set_observed_pane(client, None);
        }
    }

    /// Move the session's clients to its active pane if focus changed, then
    /// send them the current layout.
    pub(super) fn sync_clients(&self, model: &SessionManager, session_id: SessionId) {
        let Some(session) = model.session(session_id) else {
            return;
        };
        let active = session.current_window().map(Window::active_pane_id);
        for client in self.registry.session_clients(session_id) {
            if self.registry.observed_pane(client) != active {
                match active {
                    Some(pane_id) => self.subscribe(model, client, pane_id),
                    None => self.unsubscribe(model, client),
                }
            }
        }
        self.send_layout(model, session_id);
    }

    pub(super) fn send_layout(&self, model: &SessionManager, session_id: SessionId) {
        let Some((session, window, panes)) = model
            .session(session_id)
            .and_then(|s| self.describe(s))
        else {
            return;
        };
        self.registry.try_broadcast_to_session(
            session_id,
            ServerMessage::Layout {
                session,
                window,
                panes,
            },
        );
    }

    /// Session, current window and its panes as sent to clients
    pub(super) fn describe(&self, session: &Session) -> Option<(SessionInfo, WindowInfo, Vec<PaneInfo>)> {
        let window = session.current_window()?;
        let mut info = window.to_info(true);
        info.name = self.display_name(session.id(), window);
        let base = self.pane_base(session.id(), window.id());
        Some((session.to_info(), info, window.pane_infos(base)))
    }

    /// Window name, or the active pane's title with `automatic-rename`
    pub(super) fn display_name(&self, session_id: SessionId, window: &Window) -> String {
        if self
            .options
            .flag("automatic-rename", OptionTarget::window(session_id, window.id()))
        {
            if let Some(title) = window.active_pane().map(Pane::title) {
                if !title.is_empty() {
                    return title;
                }
            }
        }
        window.name().to_string()
    }

    pub(super) fn pane_base(&self, session_id: SessionId, window_id: WindowId) -> u32 {
        self.options
            .number("pane-base-index", OptionTarget::window(session_id, window_id))
            .max(0) as u32
    }

    // ==================== Sizing ====================

    /// Size the session and its windows to the attached clients per
    /// `window-size`. Returns true if any pane changed size.
    /// Size the session's windows for its read-write clients. Read-only
    /// clients never influence the size.
    pub(super) fn fit_session(&self, model: &mut SessionManager, session_id: SessionId) -> bool {
        let clients: Vec<(Dimensions, u64)> = self
            .registry
            .session_clients(session_id)
            .into_iter()
            .filter_map(|id| {
                self.registry
                    .get_client(id)
                    .filter(|c| c.access.can_write())
                    .map(|c| (c.size, c.activity))
            })
            .collect();
        if clients.is_empty() {
            return false;
        }
        let Some(session) = model.session_mut(session_id) else {
            return false;
        };

        let policy = self
            .options
            .string("window-size", OptionTarget::session(session_id));
        if let Some(size) = pick_size(&clients, &policy) {
            session.set_size(size.cols, size.rows);
        }

        let mut resized = Vec::new();
        for window in session.windows_mut() {
            let policy = self
                .options
                .string("window-size", OptionTarget::window(session_id, window.id()));
            if let Some(size) = pick_size(&clients, &policy) {
                resized.extend(window.resize(size.cols, size.rows));
            }
        }
        self.resize_ptys(&resized);
        !resized.is_empty()
    }
}

/// Size chosen by a `window-size` policy, None for `manual`
fn pick_size(clients: &[(Dimensions, u64)], policy: &str) -> Option<Dimensions> {
    match policy {
        "smallest" => Some(Dimensions::new(
            clients.iter().map(|(d, _)| d.cols).min()?,
            clients.iter().map(|(d, _)| d.rows).min()?,
        )),
        "largest" => Some(Dimensions::new(
            clients.iter().map(|(d, _)| d.cols).max()?,
            clients.iter().map(|(d, _)| d.rows).max()?,
        )),
        "latest" => clients
            .iter()
            .max_by_key(|(_, activity)| *activity)
            .map(|(d, _)| *d),
        _ => None,
    }
}

/// Default window name: the program started in it
fn window_name_for(command: Option<&str>, shell: &str) -> String {
    let program = command
        .and_then(|c| c.split_whitespace().next())
        .unwrap_or(shell);
    program
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(program)
        .to_string()
}
