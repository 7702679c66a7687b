use std::collections::{BTreeMap, HashMap};

use weft_protocol::{PaneId, SessionId, WindowId};
use weft_utils::{Result, WeftError};

use super::{Pane, Session, Window};

/// Owns every session and hands out ids
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: BTreeMap<SessionId, Session>,
    /// Map session name to ID for lookup
    name_to_id: HashMap<String, SessionId>,
    next_session: u32,
    next_window: u32,
    next_pane: u32,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session. Without a name, the session is named after
    /// its id number.
    pub fn create_session(&mut self, name: Option<&str>, cols: u16, rows: u16) -> Result<SessionId> {
        let name = match name {
            Some(name) => {
                let name = sanitize_name(name);
                if self.name_to_id.contains_key(&name) {
                    return Err(WeftError::SessionExists(name));
                }
                name
            }
            None => self.default_name(),
        };

        let id = SessionId(self.next_session);
        self.next_session += 1;
        self.name_to_id.insert(name.clone(), id);
        self.sessions.insert(id, Session::new(id, name, cols, rows));
        Ok(id)
    }

    fn default_name(&self) -> String {
        let mut n = self.next_session;
        while self.name_to_id.contains_key(&n.to_string()) {
            n += 1;
        }
        n.to_string()
    }

    pub fn alloc_window_id(&mut self) -> WindowId {
        let id = WindowId(self.next_window);
        self.next_window += 1;
        id
    }

    pub fn alloc_pane_id(&mut self) -> PaneId {
        let id = PaneId(self.next_pane);
        self.next_pane += 1;
        id
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Session with exactly this name, else the only session whose name
    /// starts with it
    pub fn session_by_name(&self, name: &str) -> Option<&Session> {
        if let Some(session) = self.name_to_id.get(name).and_then(|id| self.sessions.get(id)) {
            return Some(session);
        }
        let mut matches = self.sessions.values().filter(|s| s.name().starts_with(name));
        match (matches.next(), matches.next()) {
            (Some(s), None) => Some(s),
            _ => None,
        }
    }

    pub fn rename_session(&mut self, id: SessionId, name: &str) -> Result<()> {
        let name = sanitize_name(name);
        if let Some(existing) = self.name_to_id.get(&name) {
            if *existing == id {
                return Ok(());
            }
            return Err(WeftError::SessionExists(name));
        }
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| WeftError::SessionNotFound(id.to_string()))?;
        self.name_to_id.remove(session.name());
        self.name_to_id.insert(name.clone(), id);
        session.set_name(name);
        Ok(())
    }

    pub fn remove_session(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        self.name_to_id.remove(session.name());
        Some(session)
    }

    /// Sessions in id order
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Find window by ID
    pub fn find_window(&self, window_id: WindowId) -> Option<(&Session, &Window)> {
        self.sessions
            .values()
            .find_map(|s| s.window(window_id).map(|w| (s, w)))
    }

    pub fn window_mut(&mut self, window_id: WindowId) -> Option<&mut Window> {
        self.sessions
            .values_mut()
            .find_map(|s| s.window_mut(window_id))
    }

    /// Find pane by ID across all sessions
    pub fn find_pane(&self, pane_id: PaneId) -> Option<(&Session, &Window, &Pane)> {
        self.sessions.values().find_map(|s| {
            s.windows()
                .find_map(|w| w.pane(pane_id).map(|p| (s, w, p)))
        })
    }

    /// Session and window holding a pane
    pub fn locate_pane(&self, pane_id: PaneId) -> Option<(SessionId, WindowId)> {
        self.find_pane(pane_id).map(|(s, w, _)| (s.id(), w.id()))
    }

    pub fn pane_mut(&mut self, pane_id: PaneId) -> Option<&mut Pane> {
        self.sessions
            .values_mut()
            .flat_map(|s| s.windows_mut())
            .find_map(|w| w.pane_mut(pane_id))
    }

    /// Every pane on the server
    pub fn pane_ids(&self) -> Vec<PaneId> {
        self.sessions
            .values()
            .flat_map(|s| s.windows())
            .flat_map(|w| w.pane_ids())
            .collect()
    }
}

/// Session names may not contain the target separators
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ':' || c == '.' { '_' } else { c })
        .collect()
}
