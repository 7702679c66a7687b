//! Input and resize handlers

use tracing::{debug, trace};
use weft_protocol::{Dimensions, ErrorCode};

use crate::commands::{Command, Origin};

use super::{HandlerContext, HandlerResult};

impl HandlerContext {
    /// Forward keystrokes to the pane the client is watching
    pub(super) async fn handle_input(&self, data: Vec<u8>) -> HandlerResult {
        if !self.access.can_write() {
            return Self::error(ErrorCode::ReadOnly, "client is read-only");
        }
        let Some(pane_id) = self.registry.observed_pane(self.client_id) else {
            return Self::error(ErrorCode::NotAttached, "not attached to a session");
        };

        let input = {
            let model = self.model.read().await;
            model.find_pane(pane_id).and_then(|(_, _, pane)| pane.input())
        };
        let Some(input) = input else {
            debug!(client_id = self.client_id, pane_id = %pane_id, "input for dead pane dropped");
            return HandlerResult::NoResponse;
        };

        trace!(client_id = self.client_id, pane_id = %pane_id, bytes = data.len(), "input");
        self.registry.touch(self.client_id);
        if input.send(data).await.is_err() {
            debug!(pane_id = %pane_id, "pane input closed");
        }
        HandlerResult::NoResponse
    }

    /// Queue a size change. Read-only clients never size the session, so
    /// their resizes are dropped.
    pub(super) fn handle_resize(&self, cols: u16, rows: u16) -> HandlerResult {
        if !self.access.can_write() {
            trace!(client_id = self.client_id, cols, rows, "read-only resize ignored");
            return HandlerResult::NoResponse;
        }
        let size = Dimensions::new(cols, rows).clamped();
        debug!(client_id = self.client_id, cols = size.cols, rows = size.rows, "client resize");
        self.queue.push(
            Command::ClientResized {
                client: self.client_id,
                cols: size.cols,
                rows: size.rows,
            },
            Origin::server(),
        );
        HandlerResult::NoResponse
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{register, shared_state};
    use super::*;
    use crate::pane_io::PaneIo;
    use tokio::io::AsyncReadExt;
    use weft_protocol::{AccessMode, ServerMessage};

    /// Give the fixture pane a duplex-backed writer. Returns the far end
    /// of its input and the handle keeping its output open.
    async fn wire_pane(state: &super::super::SharedState) -> (tokio::io::DuplexStream, tokio::io::DuplexStream) {
        let (pty_out, pane_reader) = tokio::io::duplex(1024);
        let (pane_writer, pty_in) = tokio::io::duplex(1024);
        let mut model = state.model.write().await;
        let pane_id = model.pane_ids()[0];
        let pane = model.pane_mut(pane_id).unwrap();
        let io = PaneIo::start(std::sync::Arc::clone(pane.terminal()), pane_reader, pane_writer, None, |_| {});
        pane.attach_io(io, None);
        (pty_in, pty_out)
    }

    // ==================== Input Tests ====================

    #[tokio::test]
    async fn test_read_only_input_rejected() {
        let state = shared_state("");
        let (pty_in, _pty_out) = wire_pane(&state).await;
        let (client, _rx) = register(&state, AccessMode::ReadOnly);
        let ctx = HandlerContext::new(&state, client, AccessMode::ReadOnly);
        ctx.handle_attach(None, false).await;

        let result = ctx.handle_input(b"rm -rf /\r".to_vec()).await;
        assert!(matches!(
            result,
            HandlerResult::Response(ServerMessage::Error {
                code: ErrorCode::ReadOnly,
                ..
            })
        ));
        let mut pty_in = pty_in;
        let mut byte = [0u8; 1];
        let read = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            pty_in.read(&mut byte),
        )
        .await;
        assert!(read.is_err(), "read-only input reached the pane");
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_input_reaches_pane_in_order() {
        let state = shared_state("");
        let (mut pty_in, _pty_out) = wire_pane(&state).await;
        let (a, _ra) = register(&state, AccessMode::ReadWrite);
        let (b, _rb) = register(&state, AccessMode::ReadWrite);
        let ctx_a = HandlerContext::new(&state, a, AccessMode::ReadWrite);
        let ctx_b = HandlerContext::new(&state, b, AccessMode::ReadWrite);
        ctx_a.handle_attach(None, false).await;
        ctx_b.handle_attach(None, false).await;

        ctx_a.handle_input(b"ab".to_vec()).await;
        ctx_b.handle_input(b"cd".to_vec()).await;
        ctx_a.handle_input(b"ef".to_vec()).await;

        let mut buf = [0u8; 6];
        pty_in.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"abcdef");
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_input_when_not_attached() {
        let state = shared_state("");
        let (client, _rx) = register(&state, AccessMode::ReadWrite);
        let ctx = HandlerContext::new(&state, client, AccessMode::ReadWrite);
        assert!(matches!(
            ctx.handle_input(b"x".to_vec()).await,
            HandlerResult::Response(ServerMessage::Error {
                code: ErrorCode::NotAttached,
                ..
            })
        ));
        state.shutdown.cancel();
    }

    // ==================== Resize Tests ====================

    #[tokio::test]
    async fn test_resize_is_queued() {
        let state = shared_state("");
        let (client, _rx) = register(&state, AccessMode::ReadWrite);
        let ctx = HandlerContext::new(&state, client, AccessMode::ReadWrite);
        ctx.handle_attach(None, false).await;

        assert_eq!(ctx.handle_resize(100, 30), HandlerResult::NoResponse);
        // Anything queued after the resize observes it
        let out = ctx.handle_command(1, vec!["list-sessions".into()]).await;
        let HandlerResult::Response(ServerMessage::CommandResult { output, .. }) = out else {
            panic!("expected command result, got {:?}", out);
        };
        assert!(output[0].contains("[100x30]"), "{:?}", output);
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_read_only_resize_leaves_size_alone() {
        let state = shared_state("");
        let (rw, _rw_rx) = register(&state, AccessMode::ReadWrite);
        let (ro, _ro_rx) = register(&state, AccessMode::ReadOnly);
        let ctx_rw = HandlerContext::new(&state, rw, AccessMode::ReadWrite);
        let ctx_ro = HandlerContext::new(&state, ro, AccessMode::ReadOnly);
        ctx_rw.handle_attach(None, false).await;
        ctx_ro.handle_attach(None, false).await;

        assert_eq!(ctx_ro.handle_resize(5000, 3000), HandlerResult::NoResponse);
        let out = ctx_rw
            .handle_command(1, vec!["list-windows".into()])
            .await;
        let HandlerResult::Response(ServerMessage::CommandResult { output, .. }) = out else {
            panic!("expected command result, got {:?}", out);
        };
        assert!(output[0].contains("[80x24]"), "{:?}", output);
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_oversized_resize_clamped() {
        let state = shared_state("");
        let (client, _rx) = register(&state, AccessMode::ReadWrite);
        let ctx = HandlerContext::new(&state, client, AccessMode::ReadWrite);
        ctx.handle_attach(None, false).await;

        ctx.handle_resize(65535, 65535);
        let out = ctx.handle_command(1, vec!["list-windows".into()]).await;
        let HandlerResult::Response(ServerMessage::CommandResult { output, .. }) = out else {
            panic!("expected command result, got {:?}", out);
        };
        let expected = format!("[{}x{}]", weft_protocol::MAX_DIMENSION, weft_protocol::MAX_DIMENSION);
        assert!(output[0].contains(&expected), "{:?}", output);
        state.shutdown.cancel();
    }
}
