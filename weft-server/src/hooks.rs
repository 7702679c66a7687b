//! Named-event hooks
//!
//! Each event kind maps to an ordered list of actions. In-process callbacks
//! run immediately; command actions are handed back to the caller, which
//! queues them behind everything already waiting.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};
use weft_protocol::{PaneId, SessionId, WindowId};

use crate::registry::ClientId;

/// Kinds of hookable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    SessionCreated,
    SessionClosed,
    SessionRenamed,
    WindowCreated,
    WindowClosed,
    WindowRenamed,
    PaneCreated,
    PaneDied,
    PaneExited,
    ClientAttached,
    ClientDetached,
    ClientResized,
}

impl HookKind {
    pub const ALL: [HookKind; 12] = [
        HookKind::SessionCreated,
        HookKind::SessionClosed,
        HookKind::SessionRenamed,
        HookKind::WindowCreated,
        HookKind::WindowClosed,
        HookKind::WindowRenamed,
        HookKind::PaneCreated,
        HookKind::PaneDied,
        HookKind::PaneExited,
        HookKind::ClientAttached,
        HookKind::ClientDetached,
        HookKind::ClientResized,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HookKind::SessionCreated => "session-created",
            HookKind::SessionClosed => "session-closed",
            HookKind::SessionRenamed => "session-renamed",
            HookKind::WindowCreated => "window-created",
            HookKind::WindowClosed => "window-closed",
            HookKind::WindowRenamed => "window-renamed",
            HookKind::PaneCreated => "pane-created",
            HookKind::PaneDied => "pane-died",
            HookKind::PaneExited => "pane-exited",
            HookKind::ClientAttached => "client-attached",
            HookKind::ClientDetached => "client-detached",
            HookKind::ClientResized => "client-resized",
        }
    }
}

impl FromStr for HookKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown hook: {}", s))
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An event and the objects it concerns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    SessionCreated { session: SessionId },
    SessionClosed { session: SessionId },
    SessionRenamed { session: SessionId, name: String },
    WindowCreated { session: SessionId, window: WindowId },
    WindowClosed { session: SessionId, window: WindowId },
    WindowRenamed { session: SessionId, window: WindowId, name: String },
    PaneCreated { session: SessionId, window: WindowId, pane: PaneId },
    /// The pane process exited and the pane is kept by `remain-on-exit`
    PaneDied { session: SessionId, window: WindowId, pane: PaneId, status: Option<i32> },
    /// The pane process exited and the pane was removed
    PaneExited { session: SessionId, window: WindowId, pane: PaneId, status: Option<i32> },
    ClientAttached { client: ClientId, session: SessionId },
    ClientDetached { client: ClientId, session: SessionId },
    ClientResized { client: ClientId, cols: u16, rows: u16 },
}

impl HookEvent {
    pub fn kind(&self) -> HookKind {
        match self {
            HookEvent::SessionCreated { .. } => HookKind::SessionCreated,
            HookEvent::SessionClosed { .. } => HookKind::SessionClosed,
            HookEvent::SessionRenamed { .. } => HookKind::SessionRenamed,
            HookEvent::WindowCreated { .. } => HookKind::WindowCreated,
            HookEvent::WindowClosed { .. } => HookKind::WindowClosed,
            HookEvent::WindowRenamed { .. } => HookKind::WindowRenamed,
            HookEvent::PaneCreated { .. } => HookKind::PaneCreated,
            HookEvent::PaneDied { .. } => HookKind::PaneDied,
            HookEvent::PaneExited { .. } => HookKind::PaneExited,
            HookEvent::ClientAttached { .. } => HookKind::ClientAttached,
            HookEvent::ClientDetached { .. } => HookKind::ClientDetached,
            HookEvent::ClientResized { .. } => HookKind::ClientResized,
        }
    }

    /// Session the event happened in, used as the default target of hook
    /// commands
    pub fn session(&self) -> Option<SessionId> {
        match self {
            HookEvent::SessionCreated { session }
            | HookEvent::SessionClosed { session }
            | HookEvent::SessionRenamed { session, .. }
            | HookEvent::WindowCreated { session, .. }
            | HookEvent::WindowClosed { session, .. }
            | HookEvent::WindowRenamed { session, .. }
            | HookEvent::PaneCreated { session, .. }
            | HookEvent::PaneDied { session, .. }
            | HookEvent::PaneExited { session, .. }
            | HookEvent::ClientAttached { session, .. }
            | HookEvent::ClientDetached { session, .. } => Some(*session),
            HookEvent::ClientResized { .. } => None,
        }
    }

    pub fn window(&self) -> Option<WindowId> {
        match self {
            HookEvent::WindowCreated { window, .. }
            | HookEvent::WindowRenamed { window, .. }
            | HookEvent::PaneCreated { window, .. }
            | HookEvent::PaneDied { window, .. } => Some(*window),
            _ => None,
        }
    }

    pub fn pane(&self) -> Option<PaneId> {
        match self {
            HookEvent::PaneCreated { pane, .. } | HookEvent::PaneDied { pane, .. } => Some(*pane),
            _ => None,
        }
    }
}

pub type HookCallback = Arc<dyn Fn(&HookEvent) -> Result<(), String> + Send + Sync>;

/// What runs when a hook fires
#[derive(Clone)]
pub enum HookAction {
    Callback(HookCallback),
    /// Command argv, queued as a follow-up
    Command(Vec<String>),
}

impl fmt::Debug for HookAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookAction::Callback(_) => f.write_str("Callback(..)"),
            HookAction::Command(argv) => f.debug_tuple("Command").field(argv).finish(),
        }
    }
}

/// A hook command to run after the current command, in the context of the
/// event that triggered it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    pub argv: Vec<String>,
    pub event: HookEvent,
}

#[derive(Debug, Default)]
pub struct HookTable {
    hooks: HashMap<HookKind, Vec<HookAction>>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action to an event's list
    pub fn register(&mut self, kind: HookKind, action: HookAction) {
        debug!(hook = %kind, ?action, "hook registered");
        self.hooks.entry(kind).or_default().push(action);
    }

    /// Replace an event's command actions with `argv`, or append it.
    /// Callbacks are kept.
    pub fn set_command(&mut self, kind: HookKind, argv: Vec<String>, append: bool) {
        if !append {
            self.clear_commands(kind);
        }
        self.register(kind, HookAction::Command(argv));
    }

    /// Remove an event's command actions
    pub fn clear_commands(&mut self, kind: HookKind) {
        if let Some(actions) = self.hooks.get_mut(&kind) {
            actions.retain(|a| matches!(a, HookAction::Callback(_)));
        }
    }

    /// Command actions per event, for `show-hooks`
    pub fn commands(&self) -> Vec<(HookKind, Vec<String>)> {
        let mut out: Vec<(HookKind, Vec<String>)> = self
            .hooks
            .iter()
            .flat_map(|(kind, actions)| {
                actions.iter().filter_map(move |a| match a {
                    HookAction::Command(argv) => Some((*kind, argv.clone())),
                    HookAction::Callback(_) => None,
                })
            })
            .collect();
        out.sort_by_key(|(kind, _)| *kind);
        out
    }

    #[cfg(test)]
    pub fn action_count(&self, kind: HookKind) -> usize {
        self.hooks.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Run every action for `event` in registration order. Callback
    /// failures are logged and do not stop later actions. Returns the
    /// command actions to queue.
    pub fn dispatch(&self, event: &HookEvent) -> Vec<FollowUp> {
        let kind = event.kind();
        let Some(actions) = self.hooks.get(&kind) else {
            return Vec::new();
        };

        let mut follow_ups = Vec::new();
        for action in actions {
            match action {
                HookAction::Callback(callback) => {
                    match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(hook = %kind, error = %e, "hook callback failed"),
                        Err(_) => warn!(hook = %kind, "hook callback panicked"),
                    }
                }
                HookAction::Command(argv) => follow_ups.push(FollowUp {
                    argv: argv.clone(),
                    event: event.clone(),
                }),
            }
        }
        debug!(hook = %kind, follow_ups = follow_ups.len(), "hook dispatched");
        follow_ups
    }
}

/// Callback writing each event to the server log
pub fn event_logger() -> HookAction {
    HookAction::Callback(Arc::new(|event: &HookEvent| -> Result<(), String> {
        info!(
            hook = %event.kind(),
            session = ?event.session(),
            window = ?event.window(),
            pane = ?event.pane(),
            "event"
        );
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> HookAction {
        let log = Arc::clone(log);
        HookAction::Callback(Arc::new(move |event: &HookEvent| -> Result<(), String> {
            log.lock().push(format!("{}:{}", tag, event.kind()));
            Ok(())
        }))
    }

    fn created() -> HookEvent {
        HookEvent::SessionCreated { session: SessionId(1) }
    }

    // ==================== Kind Tests ====================

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in HookKind::ALL {
            assert_eq!(kind.name().parse::<HookKind>().unwrap(), kind);
        }
        assert!("after-everything".parse::<HookKind>().is_err());
    }

    #[test]
    fn test_event_context() {
        let event = HookEvent::PaneCreated {
            session: SessionId(1),
            window: WindowId(2),
            pane: PaneId(3),
        };
        assert_eq!(event.kind(), HookKind::PaneCreated);
        assert_eq!(event.session(), Some(SessionId(1)));
        assert_eq!(event.window(), Some(WindowId(2)));
        assert_eq!(event.pane(), Some(PaneId(3)));
    }

    // ==================== Dispatch Tests ====================

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = HookTable::new();
        table.register(HookKind::SessionCreated, recorder(&log, "a"));
        table.register(HookKind::SessionCreated, recorder(&log, "b"));
        table.register(HookKind::SessionClosed, recorder(&log, "c"));

        table.dispatch(&created());
        assert_eq!(
            *log.lock(),
            vec!["a:session-created".to_string(), "b:session-created".to_string()]
        );
    }

    #[test]
    fn test_failing_callback_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = HookTable::new();
        table.register(
            HookKind::SessionCreated,
            HookAction::Callback(Arc::new(|_: &HookEvent| -> Result<(), String> {
                Err("boom".into())
            })),
        );
        table.register(
            HookKind::SessionCreated,
            HookAction::Callback(Arc::new(|_: &HookEvent| -> Result<(), String> {
                panic!("hook exploded")
            })),
        );
        table.register(HookKind::SessionCreated, recorder(&log, "after"));

        table.dispatch(&created());
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_commands_become_follow_ups() {
        let mut table = HookTable::new();
        table.set_command(
            HookKind::SessionCreated,
            vec!["rename-window".into(), "main".into()],
            false,
        );
        let follow_ups = table.dispatch(&created());
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0].argv[0], "rename-window");
        assert_eq!(follow_ups[0].event, created());
    }

    #[test]
    fn test_set_command_replaces_unless_append() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = HookTable::new();
        table.register(HookKind::ClientAttached, recorder(&log, "cb"));
        table.set_command(HookKind::ClientAttached, vec!["a".into()], false);
        table.set_command(HookKind::ClientAttached, vec!["b".into()], false);
        assert_eq!(table.action_count(HookKind::ClientAttached), 2);

        table.set_command(HookKind::ClientAttached, vec!["c".into()], true);
        let commands = table.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].1, vec!["b".to_string()]);

        table.clear_commands(HookKind::ClientAttached);
        assert!(table.commands().is_empty());
        assert_eq!(table.action_count(HookKind::ClientAttached), 1);
    }

    #[test]
    fn test_dispatch_without_hooks() {
        let table = HookTable::new();
        assert!(table.dispatch(&created()).is_empty());
    }

    #[test]
    fn test_event_logger_survives_clear_and_queues_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = HookTable::new();
        table.register(HookKind::SessionCreated, event_logger());
        table.set_command(HookKind::SessionCreated, vec!["list-sessions".into()], false);
        table.register(HookKind::SessionCreated, recorder(&log, "after"));
        table.clear_commands(HookKind::SessionCreated);

        assert!(table.dispatch(&created()).is_empty());
        assert_eq!(table.action_count(HookKind::SessionCreated), 2);
        assert_eq!(*log.lock(), vec!["after:session-created".to_string()]);
    }
}
