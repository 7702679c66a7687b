//! Attached-client UI
//!
//! Owns the terminal while attached. Server messages update the mirror
//! grid and layout; terminal events become input, resize and command
//! messages.

mod render;
mod terminal;

use std::io::Write;

use crossterm::event::{Event, EventStream};
use futures::StreamExt;

use weft_protocol::{
    AccessMode, ClientMessage, ExitReason, PaneInfo, ServerMessage, SessionInfo, WindowInfo,
};
use weft_utils::Result;

use crate::connection::Connection;
use crate::input::{InputState, KeyAction};
use crate::mirror::MirrorGrid;

pub use terminal::session_size;
use render::View;
use terminal::Terminal;

/// The current window as last described by the server
#[derive(Debug, Clone)]
pub struct LayoutState {
    pub session: SessionInfo,
    pub window: WindowInfo,
    pub panes: Vec<PaneInfo>,
}

/// How an attached run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Exited(ExitReason),
    /// The connection dropped without an `Exit`
    Lost,
    /// The server refused the attach or the attaching command
    Refused(String),
}

impl Outcome {
    /// Line printed after the terminal is restored
    pub fn describe(&self) -> String {
        match self {
            Outcome::Exited(ExitReason::Detached) => "[detached]".into(),
            Outcome::Exited(ExitReason::SessionClosed) => "[exited]".into(),
            Outcome::Exited(ExitReason::ServerExited) => "[server exited]".into(),
            Outcome::Lost => "[lost server]".into(),
            Outcome::Refused(message) => message.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Refused(_) | Outcome::Lost)
    }
}

fn ring_bell() {
    let mut stdout = std::io::stdout();
    if let Err(e) = stdout.write_all(b"\x07").and_then(|_| stdout.flush()) {
        tracing::debug!(error = %e, "bell failed");
    }
}

pub struct App {
    conn: Connection,
    access: AccessMode,
    mirror: Option<MirrorGrid>,
    layout: Option<LayoutState>,
    input: InputState,
    message: Option<String>,
    next_request: u32,
    dirty: bool,
}

impl App {
    pub fn new(conn: Connection, access: AccessMode) -> Self {
        Self {
            conn,
            access,
            mirror: None,
            layout: None,
            input: InputState::new(),
            message: None,
            next_request: 1,
            dirty: true,
        }
    }

    fn attached(&self) -> bool {
        self.layout.is_some()
    }

    /// Take over the terminal, send `first` (the attach request) and run
    /// until the server lets this client go.
    pub async fn run(mut self, first: ClientMessage) -> Result<Outcome> {
        let mut terminal = Terminal::new()?;
        let mut events = EventStream::new();
        self.conn.send(first).await?;

        loop {
            if self.dirty {
                let view = self.view();
                terminal
                    .terminal_mut()
                    .draw(|frame| render::draw(frame, &view))?;
                self.dirty = false;
            }

            tokio::select! {
                msg = self.conn.recv() => {
                    let Some(msg) = msg else {
                        return Ok(Outcome::Lost);
                    };
                    if let Some(outcome) = self.handle_server(msg) {
                        return Ok(outcome);
                    }
                    if self.mirror.as_mut().is_some_and(MirrorGrid::take_bell) {
                        ring_bell();
                    }
                }
                event = events.next() => {
                    let Some(event) = event else {
                        return Ok(Outcome::Lost);
                    };
                    for msg in self.handle_event(event?) {
                        self.conn.send(msg).await?;
                    }
                }
            }
        }
    }

    fn view(&self) -> View<'_> {
        View {
            mirror: self.mirror.as_ref(),
            layout: self.layout.as_ref(),
            message: self.message.as_deref(),
            read_only: !self.access.can_write(),
            prefix_pending: self.input.prefix_pending(),
        }
    }

    /// Apply one server message. Returns the outcome once the run is over.
    fn handle_server(&mut self, msg: ServerMessage) -> Option<Outcome> {
        self.dirty = true;
        match msg {
            ServerMessage::GridSnapshot(snapshot) => {
                tracing::debug!(pane_id = %snapshot.pane_id, seq = snapshot.seq, "snapshot");
                self.mirror = Some(MirrorGrid::from_snapshot(snapshot));
            }
            ServerMessage::GridDelta(delta) => match self.mirror.as_mut() {
                Some(mirror) => {
                    self.dirty = mirror.apply_delta(delta);
                }
                None => {
                    tracing::debug!("delta before snapshot");
                    self.dirty = false;
                }
            },
            ServerMessage::Attached {
                session,
                window,
                panes,
            } => {
                tracing::info!(session = %session.name, "attached");
                self.layout = Some(LayoutState {
                    session,
                    window,
                    panes,
                });
            }
            ServerMessage::Layout {
                session,
                window,
                panes,
            } => {
                self.layout = Some(LayoutState {
                    session,
                    window,
                    panes,
                });
            }
            ServerMessage::PaneExited { pane_id, status } => {
                if self.mirror.as_ref().map(MirrorGrid::pane_id) == Some(pane_id) {
                    self.message = Some(match status {
                        Some(code) => format!("pane {} exited ({})", pane_id, code),
                        None => format!("pane {} exited", pane_id),
                    });
                }
            }
            ServerMessage::CommandResult { output, .. } => {
                self.message = output.into_iter().next();
            }
            ServerMessage::CommandFailed { message, .. } | ServerMessage::Error { message, .. } => {
                if !self.attached() {
                    return Some(Outcome::Refused(message));
                }
                self.message = Some(message);
            }
            ServerMessage::Exit { reason } => return Some(Outcome::Exited(reason)),
            ServerMessage::Connected { .. } | ServerMessage::Pong => {
                self.dirty = false;
            }
        }
        None
    }

    /// Turn a terminal event into messages for the server
    fn handle_event(&mut self, event: Event) -> Vec<ClientMessage> {
        match event {
            Event::Key(key) => {
                let action = self.input.handle_key(key);
                self.dirty = true;
                self.key_action(action)
            }
            Event::Paste(text) => self.key_action(KeyAction::Send(text.into_bytes())),
            Event::Resize(cols, rows) => {
                self.dirty = true;
                let (cols, rows) = session_size(cols, rows);
                vec![ClientMessage::Resize { cols, rows }]
            }
            _ => Vec::new(),
        }
    }

    fn key_action(&mut self, action: KeyAction) -> Vec<ClientMessage> {
        match action {
            KeyAction::Send(data) => {
                if !self.access.can_write() {
                    self.message = Some("read-only client".into());
                    return Vec::new();
                }
                self.message = None;
                vec![ClientMessage::Input { data }]
            }
            KeyAction::Command(argv) => {
                let request_id = self.next_request;
                self.next_request = self.next_request.wrapping_add(1);
                vec![ClientMessage::Command { request_id, argv }]
            }
            KeyAction::Detach => vec![ClientMessage::Detach],
            KeyAction::None => Vec::new(),
        }
    }
}
