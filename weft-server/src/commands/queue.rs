//! Command queue and its worker

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weft_protocol::{AccessMode, SessionId};

use crate::registry::ClientId;
use crate::session::SessionManager;

use super::{parse, Command, CommandError, CommandOutput, Executor};

pub type Reply = Result<CommandOutput, CommandError>;

/// Who submitted a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub client: Option<ClientId>,
    pub access: AccessMode,
    /// Session relative targets resolve against when there is no client
    pub session: Option<SessionId>,
}

impl Origin {
    pub fn client(client: ClientId, access: AccessMode) -> Self {
        Self {
            client: Some(client),
            access,
            session: None,
        }
    }

    /// The server itself
    pub fn server() -> Self {
        Self {
            client: None,
            access: AccessMode::ReadWrite,
            session: None,
        }
    }

    /// A hook command, run in the context of the event's session
    pub fn hook(session: Option<SessionId>) -> Self {
        Self {
            session,
            ..Self::server()
        }
    }
}

#[derive(Debug)]
pub struct QueuedCommand {
    pub command: Command,
    pub origin: Origin,
    pub reply: Option<oneshot::Sender<Reply>>,
}

/// Handle for submitting commands. Commands run in submission order.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<QueuedCommand>,
}

impl CommandQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueuedCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Append a command without waiting for it. Returns false once the
    /// worker has stopped.
    pub fn push(&self, command: Command, origin: Origin) -> bool {
        self.tx
            .send(QueuedCommand {
                command,
                origin,
                reply: None,
            })
            .is_ok()
    }

    /// Append a command and wait for its result
    pub async fn execute(&self, command: Command, origin: Origin) -> Reply {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(QueuedCommand {
                command,
                origin,
                reply: Some(reply_tx),
            })
            .map_err(|_| CommandError::Resource("server is shutting down".into()))?;
        reply_rx
            .await
            .map_err(|_| CommandError::Resource("server is shutting down".into()))?
    }

    /// Parse a client command line, check the client may run it, then
    /// execute it.
    pub async fn run_argv(&self, argv: &[String], origin: Origin) -> Reply {
        let (spec, command) = parse(argv)?;
        if spec.mutates && !origin.access.can_write() {
            return Err(CommandError::PermissionDenied(format!(
                "{} is not allowed for read-only clients",
                spec.name
            )));
        }
        self.execute(command, origin).await
    }
}

/// Run queued commands one at a time until `shutdown` fires. Each command
/// holds the model write lock for its whole execution; hooks it triggered
/// run after the lock is released.
pub async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<QueuedCommand>,
    mut executor: Executor,
    model: Arc<RwLock<SessionManager>>,
    shutdown: CancellationToken,
) {
    info!("command worker started");
    loop {
        let queued = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            queued = rx.recv() => match queued {
                Some(queued) => queued,
                None => break,
            },
        };

        let QueuedCommand {
            command,
            origin,
            reply,
        } = queued;
        let name = command.name();
        let result = {
            let mut model = model.write().await;
            executor.execute(&mut model, command, &origin)
        };
        match &result {
            Ok(_) => debug!(command = name, client = ?origin.client, "command done"),
            Err(e) => debug!(command = name, client = ?origin.client, error = %e, "command failed"),
        }
        executor.flush_hooks();
        if let Some(reply) = reply {
            if reply.send(result).is_err() {
                warn!(command = name, "command result dropped, requester gone");
            }
        }
    }
    info!("command worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionTree;
    use crate::registry::ClientRegistry;
    use crate::session::{Pane, Window};
    use weft_protocol::{Dimensions, Rect};

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    /// Worker over a model holding one session "work" with a single pane
    /// that has no process behind it.
    fn start() -> (CommandQueue, Arc<RwLock<SessionManager>>, CancellationToken) {
        let mut model = SessionManager::new();
        let session = model.create_session(Some("work"), 80, 24).unwrap();
        let window_id = model.alloc_window_id();
        let pane_id = model.alloc_pane_id();
        let pane = Pane::new(pane_id, window_id, Rect::new(0, 0, 80, 24), 10);
        let window = Window::new(window_id, session, 0, "main", pane, 80, 24);
        model.session_mut(session).unwrap().add_window(window);

        let model = Arc::new(RwLock::new(model));
        let (queue, rx) = CommandQueue::new();
        let shutdown = CancellationToken::new();
        let executor = Executor::new(
            Arc::new(OptionTree::new()),
            Arc::new(ClientRegistry::new()),
            queue.clone(),
            "/tmp/weft-test/default".into(),
            shutdown.clone(),
        )
        .with_default_size(Dimensions::new(80, 24));
        tokio::spawn(run_worker(rx, executor, Arc::clone(&model), shutdown.clone()));
        (queue, model, shutdown)
    }

    // ==================== Ordering Tests ====================

    #[tokio::test]
    async fn test_commands_run_in_submission_order() {
        let (queue, _model, shutdown) = start();
        for n in 1..=3 {
            let (_, cmd) = parse(&argv(&["set-option", "-g", "base-index", &n.to_string()])).unwrap();
            assert!(queue.push(cmd, Origin::server()));
        }
        let out = queue
            .run_argv(&argv(&["show-options", "-gv", "base-index"]), Origin::server())
            .await
            .unwrap();
        assert_eq!(out.lines, vec!["3".to_string()]);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_hook_follow_up_runs_after_command() {
        let (queue, model, shutdown) = start();
        queue
            .run_argv(
                &argv(&["set-hook", "session-renamed", "rename-window renamed"]),
                Origin::server(),
            )
            .await
            .unwrap();
        queue
            .run_argv(&argv(&["rename-session", "-t", "work", "play"]), Origin::server())
            .await
            .unwrap();
        // The follow-up was queued behind the rename; anything submitted
        // now runs after it
        let out = queue
            .run_argv(&argv(&["list-windows", "-t", "play"]), Origin::server())
            .await
            .unwrap();
        assert!(out.lines[0].contains("renamed"), "{:?}", out.lines);

        let model = model.read().await;
        assert!(model.session_by_name("play").is_some());
        shutdown.cancel();
    }

    // ==================== Permission Tests ====================

    #[tokio::test]
    async fn test_read_only_client_refused_mutating_command() {
        let (queue, model, shutdown) = start();
        let origin = Origin::client(7, AccessMode::ReadOnly);

        let err = queue
            .run_argv(&argv(&["kill-session", "-t", "work"]), origin)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::PermissionDenied(_)));
        assert_eq!(model.read().await.session_count(), 1);

        let out = queue.run_argv(&argv(&["list-sessions"]), origin).await.unwrap();
        assert_eq!(out.lines.len(), 1);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_failed_command_reports_error() {
        let (queue, _model, shutdown) = start();
        let err = queue
            .run_argv(&argv(&["kill-window", "-t", "nope:9"]), Origin::server())
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::SessionNotFound(_)));

        let err = queue
            .run_argv(&argv(&["bogus"]), Origin::server())
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::UnknownCommand(_)));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_stopped_worker_rejects() {
        let (queue, _model, shutdown) = start();
        shutdown.cancel();
        tokio::task::yield_now().await;
        let err = queue.execute(Command::ListSessions, Origin::server()).await;
        assert!(err.is_err());
    }
}
