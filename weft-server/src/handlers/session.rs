//! Attach, detach and command handlers

use tracing::{debug, info};
use weft_protocol::{ErrorCode, ExitReason, ServerMessage};

use crate::commands::Command;
use crate::registry::ClientState;

use super::{HandlerContext, HandlerResult};

impl HandlerContext {
    /// Queue the attach so it is ordered with structural commands. The
    /// executor delivers the snapshot and session description itself.
    pub(super) async fn handle_attach(&self, target: Option<String>, create: bool) -> HandlerResult {
        self.registry.touch(self.client_id);
        match self
            .queue
            .execute(Command::Attach { target, create }, self.origin())
            .await
        {
            Ok(_) => HandlerResult::NoResponse,
            Err(e) => Self::error(e.code(), e.to_string()),
        }
    }

    /// Leave the session. The registry entry and pane subscription are
    /// dropped here; the tree is only touched by the queued
    /// `ClientDetached`.
    pub(super) async fn handle_detach(&self) -> HandlerResult {
        if self.registry.client_session(self.client_id).is_none() {
            return Self::error(ErrorCode::NotAttached, "not attached to a session");
        }
        let model = self.model.read().await;
        self.registry.set_state(self.client_id, ClientState::Detaching);
        if let Some((_, _, pane)) = self
            .registry
            .observed_pane(self.client_id)
            .and_then(|id| model.find_pane(id))
        {
            pane.terminal().lock().unsubscribe(self.client_id);
        }
        let Some((session_id, _)) = self.registry.detach_from_session(self.client_id) else {
            return Self::error(ErrorCode::NotAttached, "not attached to a session");
        };
        drop(model);

        info!(client_id = self.client_id, session_id = %session_id, "client detaching");
        self.registry.try_send_to_client(
            self.client_id,
            ServerMessage::Exit {
                reason: ExitReason::Detached,
            },
        );
        self.queue.push(
            Command::ClientDetached {
                client: self.client_id,
                session: session_id,
            },
            self.origin(),
        );
        HandlerResult::NoResponse
    }

    pub(super) async fn handle_command(&self, request_id: u32, argv: Vec<String>) -> HandlerResult {
        debug!(client_id = self.client_id, request_id, command = ?argv.first(), "client command");
        self.registry.touch(self.client_id);
        match self.queue.run_argv(&argv, self.origin()).await {
            Ok(output) => HandlerResult::Response(ServerMessage::CommandResult {
                request_id,
                output: output.lines,
            }),
            Err(e) => HandlerResult::Response(ServerMessage::CommandFailed {
                request_id,
                code: e.code(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{register, shared_state};
    use super::*;
    use weft_protocol::AccessMode;

    fn drain(rx: &mut tokio::sync::mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    // ==================== Attach Tests ====================

    #[tokio::test]
    async fn test_attach_snapshot_comes_first() {
        let state = shared_state("Hello");
        let (client, mut rx) = register(&state, AccessMode::ReadWrite);
        let ctx = HandlerContext::new(&state, client, AccessMode::ReadWrite);

        let result = ctx.handle_attach(Some("work".into()), false).await;
        assert_eq!(result, HandlerResult::NoResponse);
        let msgs = drain(&mut rx);
        let ServerMessage::GridSnapshot(snapshot) = &msgs[0] else {
            panic!("expected snapshot first, got {:?}", msgs[0]);
        };
        assert_eq!(snapshot.row_text(0), "Hello");
        assert!(matches!(&msgs[1], ServerMessage::Attached { .. }));
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_attach_unknown_session_reports_error() {
        let state = shared_state("");
        let (client, _rx) = register(&state, AccessMode::ReadWrite);
        let ctx = HandlerContext::new(&state, client, AccessMode::ReadWrite);
        let result = ctx.handle_attach(Some("nope".into()), false).await;
        assert!(matches!(
            result,
            HandlerResult::Response(ServerMessage::Error {
                code: ErrorCode::SessionNotFound,
                ..
            })
        ));
        state.shutdown.cancel();
    }

    // ==================== Detach Tests ====================

    #[tokio::test]
    async fn test_detach_sends_exit_and_keeps_session() {
        let state = shared_state("");
        let (client, mut rx) = register(&state, AccessMode::ReadWrite);
        let ctx = HandlerContext::new(&state, client, AccessMode::ReadWrite);
        ctx.handle_attach(None, false).await;
        drain(&mut rx);

        assert_eq!(ctx.handle_detach().await, HandlerResult::NoResponse);
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::Exit {
                reason: ExitReason::Detached
            }]
        );
        // Runs after the queued ClientDetached
        let out = ctx
            .handle_command(1, vec!["list-sessions".into()])
            .await;
        let HandlerResult::Response(ServerMessage::CommandResult { output, .. }) = out else {
            panic!("expected command result, got {:?}", out);
        };
        assert_eq!(output.len(), 1);
        assert!(!output[0].contains("(attached)"));
        assert_eq!(state.registry.observed_pane(client), None);
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_detach_when_not_attached() {
        let state = shared_state("");
        let (client, _rx) = register(&state, AccessMode::ReadWrite);
        let ctx = HandlerContext::new(&state, client, AccessMode::ReadWrite);
        assert!(matches!(
            ctx.handle_detach().await,
            HandlerResult::Response(ServerMessage::Error {
                code: ErrorCode::NotAttached,
                ..
            })
        ));
        state.shutdown.cancel();
    }

    // ==================== Command Tests ====================

    #[tokio::test]
    async fn test_command_result_and_failure() {
        let state = shared_state("");
        let (client, _rx) = register(&state, AccessMode::ReadOnly);
        let ctx = HandlerContext::new(&state, client, AccessMode::ReadOnly);

        let ok = ctx.handle_command(3, vec!["list-windows".into(), "-t".into(), "work".into()]).await;
        assert!(matches!(
            ok,
            HandlerResult::Response(ServerMessage::CommandResult { request_id: 3, ref output })
                if output.len() == 1
        ));

        let denied = ctx.handle_command(4, vec!["kill-server".into()]).await;
        assert!(matches!(
            denied,
            HandlerResult::Response(ServerMessage::CommandFailed {
                request_id: 4,
                code: ErrorCode::PermissionDenied,
                ..
            })
        ));
        assert!(!state.shutdown.is_cancelled());
        state.shutdown.cancel();
    }
}
