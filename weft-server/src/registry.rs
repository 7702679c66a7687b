//! Client connection registry
//!
//! Tracks connected clients, what they are attached to and which pane they
//! are watching, and delivers messages to them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;
use weft_protocol::{AccessMode, Capabilities, Dimensions, PaneId, ServerMessage, SessionId};

/// Registry-assigned client number
pub type ClientId = u64;

/// Client lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Handshake done, not attached to a session
    Connecting,
    Attached,
    /// Detach requested; waiting for the queue to process it
    Detaching,
    Closed,
}

/// Identity and capabilities announced at connect time
#[derive(Debug, Clone)]
pub struct ClientHello {
    pub uuid: Uuid,
    pub name: String,
    pub size: Dimensions,
    pub capabilities: Capabilities,
    pub environment: Vec<(String, String)>,
    pub access: AccessMode,
}

/// Entry for a connected client
pub struct ClientEntry {
    /// Channel for sending messages to this client
    pub sender: mpsc::Sender<ServerMessage>,
    pub uuid: Uuid,
    pub name: String,
    pub access: AccessMode,
    pub state: ClientState,
    pub size: Dimensions,
    pub capabilities: Capabilities,
    pub environment: Vec<(String, String)>,
    /// Session this client is attached to (if any)
    pub session: Option<SessionId>,
    /// Pane whose screen the client is receiving
    pub observed_pane: Option<PaneId>,
    /// Activity stamp, larger is more recent
    pub activity: u64,
}

impl std::fmt::Debug for ClientEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEntry")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("observed_pane", &self.observed_pane)
            .field("sender_closed", &self.sender.is_closed())
            .finish()
    }
}

impl ClientEntry {
    /// Value of an environment variable the client reported
    pub fn env(&self, name: &str) -> Option<&str> {
        self.environment
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Registry tracking all connected clients
pub struct ClientRegistry {
    /// Client ID -> Client entry
    clients: DashMap<ClientId, ClientEntry>,
    /// Session ID -> Set of client IDs
    session_clients: DashMap<SessionId, HashSet<ClientId>>,
    next_client_id: AtomicU64,
    activity: AtomicU64,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            session_clients: DashMap::new(),
            next_client_id: AtomicU64::new(1),
            activity: AtomicU64::new(1),
        }
    }

    // ==================== Client Management ====================

    /// Register a client after a successful handshake
    pub fn register_client(&self, sender: mpsc::Sender<ServerMessage>, hello: ClientHello) -> ClientId {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let entry = ClientEntry {
            sender,
            uuid: hello.uuid,
            name: hello.name,
            access: hello.access,
            state: ClientState::Connecting,
            size: hello.size,
            capabilities: hello.capabilities,
            environment: hello.environment,
            session: None,
            observed_pane: None,
            activity: self.stamp(),
        };
        self.clients.insert(id, entry);
        debug!(client_id = id, "registered client");
        id
    }

    /// Remove a client. Returns its last session and observed pane.
    pub fn unregister_client(&self, client_id: ClientId) -> Option<(Option<SessionId>, Option<PaneId>)> {
        let (_, entry) = self.clients.remove(&client_id)?;
        if let Some(session_id) = entry.session {
            self.remove_from_session_index(client_id, session_id);
        }
        debug!(client_id, "unregistered client");
        Some((entry.session, entry.observed_pane))
    }

    pub fn get_client(
        &self,
        client_id: ClientId,
    ) -> Option<dashmap::mapref::one::Ref<'_, ClientId, ClientEntry>> {
        self.clients.get(&client_id)
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    #[cfg(test)]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Every client id, in registration order
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.clients.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn access(&self, client_id: ClientId) -> Option<AccessMode> {
        self.clients.get(&client_id).map(|e| e.access)
    }

    pub fn state(&self, client_id: ClientId) -> Option<ClientState> {
        self.clients.get(&client_id).map(|e| e.state)
    }

    pub fn set_state(&self, client_id: ClientId, state: ClientState) {
        if let Some(mut entry) = self.clients.get_mut(&client_id) {
            entry.state = state;
        }
    }

    pub fn set_size(&self, client_id: ClientId, size: Dimensions) {
        let stamp = self.stamp();
        if let Some(mut entry) = self.clients.get_mut(&client_id) {
            entry.size = size;
            entry.activity = stamp;
        }
    }

    /// Mark a client as the most recently active one
    pub fn touch(&self, client_id: ClientId) {
        let stamp = self.stamp();
        if let Some(mut entry) = self.clients.get_mut(&client_id) {
            entry.activity = stamp;
        }
    }

    fn stamp(&self) -> u64 {
        self.activity.fetch_add(1, Ordering::SeqCst)
    }

    // ==================== Session Association ====================

    /// Attach a client to a session, leaving any previous one
    pub fn attach_to_session(&self, client_id: ClientId, session_id: SessionId) -> bool {
        let mut entry = match self.clients.get_mut(&client_id) {
            Some(entry) => entry,
            None => return false,
        };
        if let Some(old) = entry.session {
            if old != session_id {
                self.remove_from_session_index(client_id, old);
            }
        }
        entry.session = Some(session_id);
        entry.state = ClientState::Attached;
        drop(entry);

        self.session_clients
            .entry(session_id)
            .or_default()
            .insert(client_id);
        debug!(client_id, session_id = %session_id, "client attached");
        true
    }

    /// Detach a client from its session. Returns the session and the pane
    /// it was watching.
    pub fn detach_from_session(&self, client_id: ClientId) -> Option<(SessionId, Option<PaneId>)> {
        let mut entry = self.clients.get_mut(&client_id)?;
        let session_id = entry.session.take()?;
        let pane = entry.observed_pane.take();
        entry.state = ClientState::Connecting;
        drop(entry);

        self.remove_from_session_index(client_id, session_id);
        debug!(client_id, session_id = %session_id, "client detached");
        Some((session_id, pane))
    }

    pub fn client_session(&self, client_id: ClientId) -> Option<SessionId> {
        self.clients.get(&client_id)?.session
    }

    /// Clients attached to a session, in registration order
    pub fn session_clients(&self, session_id: SessionId) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self
            .session_clients
            .get(&session_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn session_client_count(&self, session_id: SessionId) -> usize {
        self.session_clients
            .get(&session_id)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    fn remove_from_session_index(&self, client_id: ClientId, session_id: SessionId) {
        if let Some(mut clients) = self.session_clients.get_mut(&session_id) {
            clients.remove(&client_id);
            if clients.is_empty() {
                drop(clients);
                self.session_clients.remove(&session_id);
            }
        }
    }

    // ==================== Observation ====================

    pub fn observed_pane(&self, client_id: ClientId) -> Option<PaneId> {
        self.clients.get(&client_id)?.observed_pane
    }

    pub fn set_observed_pane(&self, client_id: ClientId, pane: Option<PaneId>) {
        if let Some(mut entry) = self.clients.get_mut(&client_id) {
            entry.observed_pane = pane;
        }
    }

    pub fn sender(&self, client_id: ClientId) -> Option<mpsc::Sender<ServerMessage>> {
        self.clients.get(&client_id).map(|e| e.sender.clone())
    }

    // ==================== Message Delivery ====================

    /// Queue a message for a client without waiting. Returns false if the
    /// client is gone or its queue is full.
    pub fn try_send_to_client(&self, client_id: ClientId, message: ServerMessage) -> bool {
        let sender = match self.clients.get(&client_id) {
            Some(entry) => entry.sender.clone(),
            None => return false,
        };
        match sender.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(client_id, "client channel closed");
                false
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(client_id, "client channel full, message dropped");
                false
            }
        }
    }

    /// Send a message to every client attached to a session. Returns how
    /// many accepted it.
    pub fn try_broadcast_to_session(&self, session_id: SessionId, message: ServerMessage) -> usize {
        self.session_clients(session_id)
            .into_iter()
            .filter(|id| self.try_send_to_client(*id, message.clone()))
            .count()
    }
}
