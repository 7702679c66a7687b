//! Target resolution
//!
//! Targets name a session, window or pane:
//!
//! - `session`, `session:window`, `session:window.pane`
//! - `:window`, `.pane` (relative to the invoking client's session)
//! - `$<id>`, `@<id>`, `%<id>`
//!
//! Windows are matched by `@id`, index, `!` (last window) or name (exact,
//! then unique prefix). Panes are matched by `%id`, index or `!`.

use weft_protocol::{PaneId, SessionId, WindowId};

use crate::options::{OptionTarget, OptionTree};
use crate::session::{Session, SessionManager, Window};

use super::CommandError;

/// Target string split into its parts
#[derive(Debug, Default, PartialEq, Eq)]
struct Parts<'a> {
    session: Option<&'a str>,
    window: Option<&'a str>,
    pane: Option<&'a str>,
    /// No `:` or `.` separator, so the string may name any level
    bare: bool,
}

fn split(target: &str) -> Parts<'_> {
    if target.starts_with('%') {
        return Parts {
            pane: Some(target),
            ..Parts::default()
        };
    }
    if let Some((session, rest)) = target.split_once(':') {
        let (window, pane) = split_window_pane(rest);
        return Parts {
            session: non_empty(session),
            window,
            pane,
            bare: false,
        };
    }
    if let Some(pane) = target.strip_prefix('.') {
        return Parts {
            pane: non_empty(pane),
            ..Parts::default()
        };
    }
    let (window, pane) = split_window_pane(target);
    if pane.is_some() || target.starts_with('@') {
        return Parts {
            window,
            pane,
            ..Parts::default()
        };
    }
    Parts {
        session: non_empty(target),
        bare: true,
        ..Parts::default()
    }
}

fn split_window_pane(rest: &str) -> (Option<&str>, Option<&str>) {
    match rest.rsplit_once('.') {
        Some((window, pane)) if looks_like_pane(pane) => (non_empty(window), Some(pane)),
        _ => (non_empty(rest), None),
    }
}

fn looks_like_pane(s: &str) -> bool {
    s == "!" || s.starts_with('%') || (!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Resolves targets for one command invocation
pub struct Resolver<'a> {
    model: &'a SessionManager,
    options: &'a OptionTree,
    /// Session of the invoking client or hook event
    current: Option<SessionId>,
}

impl<'a> Resolver<'a> {
    pub fn new(model: &'a SessionManager, options: &'a OptionTree, current: Option<SessionId>) -> Self {
        Self {
            model,
            options,
            current,
        }
    }

    /// Session used when the target does not name one: the caller's,
    /// otherwise the most recently created.
    fn default_session(&self) -> Result<&'a Session, CommandError> {
        self.current
            .and_then(|id| self.model.session(id))
            .or_else(|| self.model.sessions().last())
            .ok_or_else(|| CommandError::SessionNotFound("no sessions".into()))
    }

    fn lookup_session(&self, name: &str) -> Result<&'a Session, CommandError> {
        let found = match SessionId::parse(name) {
            Some(id) => self.model.session(id),
            None => self.model.session_by_name(name),
        };
        found.ok_or_else(|| CommandError::SessionNotFound(name.to_string()))
    }

    fn lookup_window(&self, session: &'a Session, spec: &str) -> Result<&'a Window, CommandError> {
        let not_found = || CommandError::WindowNotFound(spec.to_string());
        if spec.starts_with(WindowId::PREFIX) {
            let id = WindowId::parse(spec).ok_or_else(not_found)?;
            return session.window(id).ok_or_else(not_found);
        }
        if spec == "!" {
            return session
                .last_window_id()
                .and_then(|id| session.window(id))
                .ok_or_else(not_found);
        }
        if let Ok(index) = spec.parse::<u32>() {
            if let Some(window) = session.window_by_index(index) {
                return Ok(window);
            }
        }
        session.window_by_name(spec).ok_or_else(not_found)
    }

    fn lookup_pane(&self, session: &Session, window: &Window, spec: &str) -> Result<PaneId, CommandError> {
        let not_found = || CommandError::PaneNotFound(spec.to_string());
        if spec.starts_with(PaneId::PREFIX) {
            let id = PaneId::parse(spec).ok_or_else(not_found)?;
            return window.contains(id).then_some(id).ok_or_else(not_found);
        }
        if spec == "!" {
            return window.last_pane_id().ok_or_else(not_found);
        }
        let index: u32 = spec.parse().map_err(|_| not_found())?;
        window
            .pane_by_index(index, self.pane_base(session, window))
            .ok_or_else(not_found)
    }

    pub fn pane_base(&self, session: &Session, window: &Window) -> u32 {
        self.options
            .number("pane-base-index", OptionTarget::window(session.id(), window.id())) as u32
    }

    fn current_window(session: &'a Session) -> Result<&'a Window, CommandError> {
        session
            .current_window()
            .ok_or_else(|| CommandError::WindowNotFound(format!("{}: no windows", session.name())))
    }

    /// Resolve a session target
    pub fn session(&self, target: Option<&str>) -> Result<SessionId, CommandError> {
        let Some(target) = target else {
            return Ok(self.default_session()?.id());
        };
        if target.starts_with(PaneId::PREFIX) || target.starts_with(WindowId::PREFIX) {
            let (session, _, _) = self.pane(Some(target))?;
            return Ok(session);
        }
        let parts = split(target);
        match parts.session {
            Some(name) => Ok(self.lookup_session(name)?.id()),
            None => Ok(self.default_session()?.id()),
        }
    }

    /// Resolve a window target. A bare word is tried as a window of the
    /// current session before it is tried as a session name.
    pub fn window(&self, target: Option<&str>) -> Result<(SessionId, WindowId), CommandError> {
        let Some(target) = target else {
            let session = self.default_session()?;
            return Ok((session.id(), Self::current_window(session)?.id()));
        };
        if target.starts_with(PaneId::PREFIX) {
            let (session, window, _) = self.pane(Some(target))?;
            return Ok((session, window));
        }
        if target.starts_with(WindowId::PREFIX) {
            let spec = split(target).window.unwrap_or(target);
            let id = WindowId::parse(spec)
                .ok_or_else(|| CommandError::WindowNotFound(target.to_string()))?;
            let (session, window) = self
                .model
                .find_window(id)
                .ok_or_else(|| CommandError::WindowNotFound(target.to_string()))?;
            return Ok((session.id(), window.id()));
        }

        let parts = split(target);
        if parts.bare {
            if let Ok(session) = self.default_session() {
                if let Ok(window) = self.lookup_window(session, target) {
                    return Ok((session.id(), window.id()));
                }
            }
            let session = self
                .lookup_session(target)
                .map_err(|_| CommandError::WindowNotFound(target.to_string()))?;
            return Ok((session.id(), Self::current_window(session)?.id()));
        }

        let session = match parts.session {
            Some(name) => self.lookup_session(name)?,
            None => self.default_session()?,
        };
        let window = match parts.window {
            Some(spec) => self.lookup_window(session, spec)?,
            None => Self::current_window(session)?,
        };
        Ok((session.id(), window.id()))
    }

    /// Resolve a pane target
    pub fn pane(&self, target: Option<&str>) -> Result<(SessionId, WindowId, PaneId), CommandError> {
        if let Some(target) = target.filter(|t| t.starts_with(PaneId::PREFIX)) {
            let id = PaneId::parse(target)
                .ok_or_else(|| CommandError::PaneNotFound(target.to_string()))?;
            let (session, window) = self
                .model
                .locate_pane(id)
                .ok_or_else(|| CommandError::PaneNotFound(target.to_string()))?;
            return Ok((session, window, id));
        }

        let pane_spec = target.and_then(|t| split(t).pane);
        let window_target = match target {
            Some(t) if t.starts_with('.') => None,
            Some(t) => Some(match pane_spec {
                Some(pane) => &t[..t.len() - pane.len() - 1],
                None => t,
            }),
            None => None,
        };
        let window_target = window_target.filter(|t| !t.is_empty() && *t != ":");
        let (session_id, window_id) = match window_target {
            Some(t) if t.ends_with(':') => {
                let session = self.lookup_session(&t[..t.len() - 1])?;
                (session.id(), Self::current_window(session)?.id())
            }
            other => self.window(other)?,
        };

        let (session, window) = self
            .model
            .session(session_id)
            .and_then(|s| s.window(window_id).map(|w| (s, w)))
            .ok_or_else(|| CommandError::WindowNotFound(window_id.to_string()))?;
        let pane = match pane_spec {
            Some(spec) => self.lookup_pane(session, window, spec)?,
            None => window.active_pane_id(),
        };
        Ok((session_id, window_id, pane))
    }
}
