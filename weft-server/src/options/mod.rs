//! Server, session, window and pane options
//!
//! The server table always holds every option. Session, window and pane
//! tables hold overrides only; the effective value of an option is the most
//! specific override found walking pane -> window -> session -> server.

mod table;

pub use table::{find_option, OptionDefault, OptionKind, OptionScope, OptionSpec, OPTION_TABLE};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;
use weft_protocol::{PaneId, SessionId, WindowId};

/// A typed option value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    String(String),
    Number(i64),
    Flag(bool),
    Array(Vec<String>),
}

impl OptionValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::String(_) => "string",
            OptionValue::Number(_) => "number",
            OptionValue::Flag(_) => "flag",
            OptionValue::Array(_) => "array",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            OptionValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[String]> {
        match self {
            OptionValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::String(s) => write!(f, "{}", s),
            OptionValue::Number(n) => write!(f, "{}", n),
            OptionValue::Flag(true) => f.write_str("on"),
            OptionValue::Flag(false) => f.write_str("off"),
            OptionValue::Array(items) => write!(f, "{}", items.join(" ")),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("{name} is a {allowed} option and cannot be set at {requested} scope")]
    WrongScope {
        name: String,
        allowed: OptionScope,
        requested: OptionScope,
    },
}

/// Table an option is stored in or removed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeTarget {
    Server,
    Session(SessionId),
    Window(WindowId),
    Pane(PaneId),
}

impl ScopeTarget {
    pub fn scope(&self) -> OptionScope {
        match self {
            ScopeTarget::Server => OptionScope::Server,
            ScopeTarget::Session(_) => OptionScope::Session,
            ScopeTarget::Window(_) => OptionScope::Window,
            ScopeTarget::Pane(_) => OptionScope::Pane,
        }
    }
}

/// Where an effective value is resolved from. Missing levels are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionTarget {
    pub session: Option<SessionId>,
    pub window: Option<WindowId>,
    pub pane: Option<PaneId>,
}

impl OptionTarget {
    pub fn server() -> Self {
        Self::default()
    }

    pub fn session(session: SessionId) -> Self {
        Self {
            session: Some(session),
            ..Self::default()
        }
    }

    pub fn window(session: SessionId, window: WindowId) -> Self {
        Self {
            session: Some(session),
            window: Some(window),
            pane: None,
        }
    }

    pub fn pane(session: SessionId, window: WindowId, pane: PaneId) -> Self {
        Self {
            session: Some(session),
            window: Some(window),
            pane: Some(pane),
        }
    }
}

type OptionMap = HashMap<String, OptionValue>;

/// Owned option state of one server
#[derive(Debug)]
pub struct OptionTree {
    server: ArcSwap<OptionMap>,
    sessions: DashMap<SessionId, OptionMap>,
    windows: DashMap<WindowId, OptionMap>,
    panes: DashMap<PaneId, OptionMap>,
}

impl Default for OptionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionTree {
    /// Tree with every option at its schema default
    pub fn new() -> Self {
        let server: OptionMap = OPTION_TABLE
            .iter()
            .map(|spec| (spec.name.to_string(), spec.default.to_value()))
            .collect();
        Self {
            server: ArcSwap::from_pointee(server),
            sessions: DashMap::new(),
            windows: DashMap::new(),
            panes: DashMap::new(),
        }
    }

    /// Tree whose defaults also reflect the server's environment: the
    /// detected shell and the key flavour implied by `VISUAL`/`EDITOR`.
    pub fn with_environment_defaults() -> Self {
        let tree = Self::new();
        tree.store_server("default-shell", OptionValue::String(weft_utils::env::default_shell()));
        if let Some(keys) = weft_utils::env::default_mode_keys() {
            let keys = OptionValue::String(keys.as_str().to_string());
            tree.store_server("status-keys", keys.clone());
            tree.store_server("mode-keys", keys);
        }
        tree
    }

    fn store_server(&self, name: &str, value: OptionValue) {
        let mut map = OptionMap::clone(&self.server.load());
        map.insert(name.to_string(), value);
        self.server.store(Arc::new(map));
    }

    /// Effective value of `name` for `target`
    pub fn get_effective(&self, name: &str, target: OptionTarget) -> Result<OptionValue, OptionError> {
        if find_option(name).is_none() {
            return Err(OptionError::UnknownOption(name.to_string()));
        }
        if let Some(value) = target
            .pane
            .and_then(|id| self.panes.get(&id).and_then(|m| m.get(name).cloned()))
        {
            return Ok(value);
        }
        if let Some(value) = target
            .window
            .and_then(|id| self.windows.get(&id).and_then(|m| m.get(name).cloned()))
        {
            return Ok(value);
        }
        if let Some(value) = target
            .session
            .and_then(|id| self.sessions.get(&id).and_then(|m| m.get(name).cloned()))
        {
            return Ok(value);
        }
        self.server
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| OptionError::UnknownOption(name.to_string()))
    }

    /// Override stored directly in one table, if any
    pub fn get_local(&self, name: &str, scope: ScopeTarget) -> Option<OptionValue> {
        match scope {
            ScopeTarget::Server => self.server.load().get(name).cloned(),
            ScopeTarget::Session(id) => self.sessions.get(&id)?.get(name).cloned(),
            ScopeTarget::Window(id) => self.windows.get(&id)?.get(name).cloned(),
            ScopeTarget::Pane(id) => self.panes.get(&id)?.get(name).cloned(),
        }
    }

    pub fn string(&self, name: &str, target: OptionTarget) -> String {
        self.typed(name, target, |v| v.as_str().map(str::to_string))
    }

    pub fn number(&self, name: &str, target: OptionTarget) -> i64 {
        self.typed(name, target, OptionValue::as_number)
    }

    pub fn flag(&self, name: &str, target: OptionTarget) -> bool {
        self.typed(name, target, OptionValue::as_flag)
    }

    pub fn array(&self, name: &str, target: OptionTarget) -> Vec<String> {
        self.typed(name, target, |v| v.as_array().map(<[String]>::to_vec))
    }

    fn typed<T: Default>(
        &self,
        name: &str,
        target: OptionTarget,
        extract: impl Fn(&OptionValue) -> Option<T>,
    ) -> T {
        let value = self.get_effective(name, target).ok();
        let typed = value.as_ref().and_then(extract);
        debug_assert!(typed.is_some(), "option {} missing or mistyped", name);
        typed.unwrap_or_default()
    }

    /// Validate and store a value.
    pub fn set(&self, name: &str, value: OptionValue, scope: ScopeTarget) -> Result<(), OptionError> {
        let spec = find_option(name).ok_or_else(|| OptionError::UnknownOption(name.to_string()))?;
        if !spec.allows(scope.scope()) {
            return Err(OptionError::WrongScope {
                name: name.to_string(),
                allowed: spec.scope,
                requested: scope.scope(),
            });
        }
        spec.validate(&value)?;
        debug!(option = name, value = %value, scope = ?scope, "option set");

        match scope {
            ScopeTarget::Server => self.store_server(name, value),
            ScopeTarget::Session(id) => {
                self.sessions.entry(id).or_default().insert(name.to_string(), value);
            }
            ScopeTarget::Window(id) => {
                self.windows.entry(id).or_default().insert(name.to_string(), value);
            }
            ScopeTarget::Pane(id) => {
                self.panes.entry(id).or_default().insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Parse the textual form of a value and store it.
    pub fn set_str(&self, name: &str, raw: &str, scope: ScopeTarget) -> Result<(), OptionError> {
        let spec = find_option(name).ok_or_else(|| OptionError::UnknownOption(name.to_string()))?;
        let value = spec.parse_value(raw)?;
        self.set(name, value, scope)
    }

    /// Remove an override. At server scope the schema default is restored.
    pub fn unset(&self, name: &str, scope: ScopeTarget) -> Result<(), OptionError> {
        let spec = find_option(name).ok_or_else(|| OptionError::UnknownOption(name.to_string()))?;
        match scope {
            ScopeTarget::Server => self.store_server(name, spec.default.to_value()),
            ScopeTarget::Session(id) => {
                if let Some(mut map) = self.sessions.get_mut(&id) {
                    map.remove(name);
                }
            }
            ScopeTarget::Window(id) => {
                if let Some(mut map) = self.windows.get_mut(&id) {
                    map.remove(name);
                }
            }
            ScopeTarget::Pane(id) => {
                if let Some(mut map) = self.panes.get_mut(&id) {
                    map.remove(name);
                }
            }
        }
        debug!(option = name, scope = ?scope, "option unset");
        Ok(())
    }

    /// Values stored in one table, sorted by name
    pub fn list(&self, scope: ScopeTarget) -> Vec<(String, OptionValue)> {
        let mut out: Vec<(String, OptionValue)> = match scope {
            ScopeTarget::Server => self
                .server
                .load()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ScopeTarget::Session(id) => clone_map(self.sessions.get(&id).as_deref()),
            ScopeTarget::Window(id) => clone_map(self.windows.get(&id).as_deref()),
            ScopeTarget::Pane(id) => clone_map(self.panes.get(&id).as_deref()),
        };
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Drop a destroyed object's overrides
    pub fn remove_scope(&self, scope: ScopeTarget) {
        match scope {
            ScopeTarget::Server => {}
            ScopeTarget::Session(id) => {
                self.sessions.remove(&id);
            }
            ScopeTarget::Window(id) => {
                self.windows.remove(&id);
            }
            ScopeTarget::Pane(id) => {
                self.panes.remove(&id);
            }
        }
    }
}

fn clone_map(map: Option<&OptionMap>) -> Vec<(String, OptionValue)> {
    map.map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: SessionId = SessionId(0);
    const W1: WindowId = WindowId(1);
    const W2: WindowId = WindowId(2);
    const P: PaneId = PaneId(5);

    // ==================== Resolution Tests ====================

    #[test]
    fn test_server_has_every_default() {
        let tree = OptionTree::new();
        for spec in OPTION_TABLE {
            assert!(tree.get_local(spec.name, ScopeTarget::Server).is_some());
        }
        assert_eq!(tree.number("history-limit", OptionTarget::server()), 2000);
        assert!(tree.flag("exit-empty", OptionTarget::server()));
    }

    #[test]
    fn test_unknown_option() {
        let tree = OptionTree::new();
        assert_eq!(
            tree.get_effective("nope", OptionTarget::server()),
            Err(OptionError::UnknownOption("nope".into()))
        );
        assert!(tree.set_str("nope", "1", ScopeTarget::Server).is_err());
    }

    #[test]
    fn test_window_override_is_local() {
        let tree = OptionTree::new();
        tree.set_str("pane-base-index", "1", ScopeTarget::Session(S)).unwrap();
        tree.set_str("pane-base-index", "5", ScopeTarget::Window(W1)).unwrap();

        assert_eq!(tree.number("pane-base-index", OptionTarget::window(S, W1)), 5);
        assert_eq!(tree.number("pane-base-index", OptionTarget::window(S, W2)), 1);
        assert_eq!(tree.number("pane-base-index", OptionTarget::server()), 0);

        tree.unset("pane-base-index", ScopeTarget::Window(W1)).unwrap();
        assert_eq!(tree.number("pane-base-index", OptionTarget::window(S, W1)), 1);
    }

    #[test]
    fn test_pane_override_wins() {
        let tree = OptionTree::new();
        tree.set("remain-on-exit", OptionValue::Flag(true), ScopeTarget::Window(W1))
            .unwrap();
        tree.set("remain-on-exit", OptionValue::Flag(false), ScopeTarget::Pane(P))
            .unwrap();
        assert!(!tree.flag("remain-on-exit", OptionTarget::pane(S, W1, P)));
        assert!(tree.flag("remain-on-exit", OptionTarget::window(S, W1)));
    }

    #[test]
    fn test_unset_server_restores_default() {
        let tree = OptionTree::new();
        tree.set_str("history-limit", "50", ScopeTarget::Server).unwrap();
        assert_eq!(tree.number("history-limit", OptionTarget::session(S)), 50);
        tree.unset("history-limit", ScopeTarget::Server).unwrap();
        assert_eq!(tree.number("history-limit", OptionTarget::session(S)), 2000);
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_set_rejects_wrong_scope() {
        let tree = OptionTree::new();
        let err = tree
            .set_str("base-index", "1", ScopeTarget::Window(W1))
            .unwrap_err();
        assert!(matches!(err, OptionError::WrongScope { .. }));
        assert!(tree.list(ScopeTarget::Window(W1)).is_empty());
    }

    #[test]
    fn test_set_rejects_invalid_value() {
        let tree = OptionTree::new();
        assert!(tree
            .set("history-limit", OptionValue::Number(-5), ScopeTarget::Server)
            .is_err());
        assert!(tree
            .set_str("window-size", "huge", ScopeTarget::Session(S))
            .is_err());
        assert_eq!(tree.number("history-limit", OptionTarget::server()), 2000);
    }

    // ==================== Listing Tests ====================

    #[test]
    fn test_list_is_sorted() {
        let tree = OptionTree::new();
        tree.set_str("status-keys", "vi", ScopeTarget::Session(S)).unwrap();
        tree.set_str("base-index", "1", ScopeTarget::Session(S)).unwrap();
        let names: Vec<String> = tree
            .list(ScopeTarget::Session(S))
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(names, vec!["base-index", "status-keys"]);
    }

    #[test]
    fn test_remove_scope() {
        let tree = OptionTree::new();
        tree.set_str("base-index", "3", ScopeTarget::Session(S)).unwrap();
        tree.remove_scope(ScopeTarget::Session(S));
        assert_eq!(tree.number("base-index", OptionTarget::session(S)), 0);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(OptionValue::Flag(true).to_string(), "on");
        assert_eq!(OptionValue::Number(3).to_string(), "3");
        assert_eq!(
            OptionValue::Array(vec!["A".into(), "B".into()]).to_string(),
            "A B"
        );
    }

    #[test]
    fn test_environment_defaults() {
        let tree = OptionTree::with_environment_defaults();
        assert!(tree.string("default-shell", OptionTarget::server()).starts_with('/'));
    }
}
