//! Per-pane I/O tasks and observer fanout
//!
//! Each pane has one output pump (pty -> grid -> observers) and one input
//! writer (queued client input -> pty). The grid and the observer list live
//! together behind one mutex, so every observer sees the same linear sequence
//! of snapshots and deltas.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use weft_protocol::{GridSnapshot, PaneId, ServerMessage};

use crate::grid::{DamageTracker, Grid};
use crate::pty::ExitWatcher;
use crate::registry::ClientId;

/// Bytes read from the pty per output cycle
pub const READ_CHUNK: usize = 64 * 1024;

/// Pending input chunks per pane
pub const INPUT_QUEUE_DEPTH: usize = 256;

/// How often stale observers are retried while a pane is quiet
const RESYNC_INTERVAL: Duration = Duration::from_millis(50);

pub type SharedTerminal = Arc<Mutex<PaneTerminal>>;

#[derive(Debug)]
struct Observer {
    client_id: ClientId,
    tx: mpsc::Sender<ServerMessage>,
    /// Missed at least one message; gets a snapshot as soon as it has room
    stale: bool,
}

/// A pane's screen and the clients watching it
#[derive(Debug)]
pub struct PaneTerminal {
    pane_id: PaneId,
    grid: Grid,
    damage: DamageTracker,
    seq: u64,
    observers: Vec<Observer>,
}

impl PaneTerminal {
    pub fn new(pane_id: PaneId, grid: Grid) -> Self {
        let damage = DamageTracker::new(&grid);
        Self {
            pane_id,
            grid,
            damage,
            seq: 0,
            observers: Vec::new(),
        }
    }

    pub fn shared(pane_id: PaneId, grid: Grid) -> SharedTerminal {
        Arc::new(Mutex::new(Self::new(pane_id, grid)))
    }

    pub fn pane_id(&self) -> PaneId {
        self.pane_id
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Sequence number of the last published update
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn snapshot(&self) -> GridSnapshot {
        self.grid.snapshot(self.pane_id, self.seq)
    }

    #[cfg(test)]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn observers(&self) -> Vec<ClientId> {
        self.observers.iter().map(|o| o.client_id).collect()
    }

    pub fn has_stale(&self) -> bool {
        self.observers.iter().any(|o| o.stale)
    }

    /// Queue a full snapshot to `client_id` and add it to the fanout list.
    /// Nothing published later can overtake the snapshot.
    pub fn subscribe(&mut self, client_id: ClientId, tx: mpsc::Sender<ServerMessage>) {
        self.observers.retain(|o| o.client_id != client_id);
        let stale = match tx.try_send(ServerMessage::GridSnapshot(self.snapshot())) {
            Ok(()) => false,
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => return,
        };
        debug!(pane_id = %self.pane_id, client_id, stale, "observer subscribed");
        self.observers.push(Observer {
            client_id,
            tx,
            stale,
        });
    }

    pub fn unsubscribe(&mut self, client_id: ClientId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| o.client_id != client_id);
        before != self.observers.len()
    }

    /// Feed pty output through the grid and publish the result. Returns
    /// bytes the terminal must send back to the pty.
    pub fn process(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.grid.process(bytes);
        self.publish();
        self.grid.take_replies()
    }

    /// Write text into the screen that did not come from the pty
    pub fn inject(&mut self, text: &str) {
        self.grid.process(text.as_bytes());
        self.publish();
    }

    /// End of output: drop partial sequences and publish what is left.
    pub fn finish(&mut self) {
        self.grid.finish();
        self.publish();
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.grid.resize(cols, rows);
        self.publish();
    }

    /// Send pending changes to every observer.
    pub fn publish(&mut self) {
        if self.grid.was_resized() || !self.damage.matches(&self.grid) {
            self.seq += 1;
            self.grid.clear_damage();
            self.damage.reset(&self.grid);
            let snapshot = self.snapshot();
            trace!(pane_id = %self.pane_id, seq = self.seq, "publishing snapshot");
            self.fanout(ServerMessage::GridSnapshot(snapshot));
            return;
        }

        if let Some(delta) = self
            .damage
            .take_delta(&mut self.grid, self.pane_id, self.seq + 1)
        {
            self.seq += 1;
            trace!(pane_id = %self.pane_id, seq = self.seq, runs = delta.runs.len(), "publishing delta");
            self.fanout(ServerMessage::GridDelta(delta));
        } else {
            self.resync_stale();
        }
    }

    /// Retry observers that fell behind.
    pub fn resync_stale(&mut self) {
        if !self.has_stale() {
            return;
        }
        let snapshot = self.snapshot();
        let pane_id = self.pane_id;
        self.observers.retain_mut(|obs| {
            if !obs.stale {
                return true;
            }
            match obs.tx.try_send(ServerMessage::GridSnapshot(snapshot.clone())) {
                Ok(()) => {
                    debug!(pane_id = %pane_id, client_id = obs.client_id, "stale observer resynced");
                    obs.stale = false;
                    true
                }
                Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Closed(_)) => false,
            }
        });
    }

    fn fanout(&mut self, msg: ServerMessage) {
        let pane_id = self.pane_id;
        let mut snapshot: Option<GridSnapshot> = None;
        let grid = &self.grid;
        let seq = self.seq;

        self.observers.retain_mut(|obs| {
            let result = if obs.stale {
                let snap = snapshot.get_or_insert_with(|| grid.snapshot(pane_id, seq));
                obs.tx.try_send(ServerMessage::GridSnapshot(snap.clone()))
            } else {
                obs.tx.try_send(msg.clone())
            };
            match result {
                Ok(()) => {
                    obs.stale = false;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    if !obs.stale {
                        debug!(pane_id = %pane_id, client_id = obs.client_id, "observer queue full, marking stale");
                    }
                    obs.stale = true;
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(pane_id = %pane_id, client_id = obs.client_id, "observer gone");
                    false
                }
            }
        });
    }
}

/// Handle to a running pane's I/O tasks
#[derive(Debug)]
pub struct PaneIo {
    terminal: SharedTerminal,
    input: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
}

impl PaneIo {
    /// Start the output pump and input writer for a pane.
    ///
    /// `on_exit` runs once output has ended, with the process exit status
    /// when one could be collected. It does not run when the pane is
    /// stopped with [`PaneIo::stop`].
    pub fn start<R, W, F>(
        terminal: SharedTerminal,
        reader: R,
        writer: W,
        exit: Option<ExitWatcher>,
        on_exit: F,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        F: FnOnce(Option<i32>) + Send + 'static,
    {
        let (input, input_rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
        let cancel = CancellationToken::new();
        let pane_id = terminal.lock().pane_id();

        tokio::spawn(run_input_writer(pane_id, writer, input_rx, cancel.clone()));

        let pump_terminal = Arc::clone(&terminal);
        let pump_input = input.clone();
        let pump_cancel = cancel.clone();
        tokio::spawn(async move {
            let ended = run_output_pump(reader, pump_terminal, pump_input, pump_cancel.clone()).await;
            if !ended {
                return;
            }
            let status = match exit {
                Some(watcher) => watcher.wait().await,
                None => None,
            };
            if !pump_cancel.is_cancelled() {
                debug!(pane_id = %pane_id, ?status, "pane output ended");
                on_exit(status);
            }
        });

        Self {
            terminal,
            input,
            cancel,
        }
    }

    pub fn terminal(&self) -> &SharedTerminal {
        &self.terminal
    }

    /// Sender for the pane's input queue
    pub fn input(&self) -> mpsc::Sender<Vec<u8>> {
        self.input.clone()
    }

    /// Stop both tasks. In-flight output already holding the terminal lock
    /// completes first.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PaneIo {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Read pty output until EOF or cancellation. Returns true on EOF.
pub async fn run_output_pump<R>(
    mut reader: R,
    terminal: SharedTerminal,
    input: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
) -> bool
where
    R: AsyncRead + Unpin,
{
    let pane_id = terminal.lock().pane_id();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let stale = terminal.lock().has_stale();
        let n = tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(RESYNC_INTERVAL), if stale => {
                terminal.lock().resync_stale();
                continue;
            }
            result = reader.read(&mut buf) => match result {
                Ok(n) => n,
                Err(e) => {
                    warn!(pane_id = %pane_id, error = %e, "pty read failed");
                    0
                }
            },
        };

        if n == 0 {
            terminal.lock().finish();
            return true;
        }

        let replies = terminal.lock().process(&buf[..n]);
        if !replies.is_empty() {
            if let Err(e) = input.try_send(replies) {
                debug!(pane_id = %pane_id, error = %e, "dropped terminal reply");
            }
        }
    }
}

/// Write queued input chunks to the pty in arrival order.
pub async fn run_input_writer<W>(
    pane_id: PaneId,
    mut writer: W,
    mut rx: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = rx.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };
        if let Err(e) = writer.write_all(&chunk).await {
            warn!(pane_id = %pane_id, error = %e, "pty write failed");
            break;
        }
        trace!(pane_id = %pane_id, bytes = chunk.len(), "wrote input");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio::sync::oneshot;

    fn terminal(cols: u16, rows: u16) -> SharedTerminal {
        PaneTerminal::shared(PaneId(1), Grid::new(cols, rows))
    }

    fn expect_snapshot(msg: ServerMessage) -> GridSnapshot {
        match msg {
            ServerMessage::GridSnapshot(s) => s,
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    // ==================== Fanout Tests ====================

    #[test]
    fn test_subscribe_sends_snapshot_first() {
        let term = terminal(20, 5);
        term.lock().process(b"Hello");

        let (tx, mut rx) = mpsc::channel(8);
        term.lock().subscribe(7, tx);

        let snap = expect_snapshot(rx.try_recv().unwrap());
        assert_eq!(snap.row_text(0), "Hello");
        assert_eq!(snap.cursor.col, 5);
        assert_eq!(term.lock().observers(), vec![7]);
    }

    #[test]
    fn test_deltas_reach_all_observers_in_order() {
        let term = terminal(20, 5);
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        term.lock().subscribe(1, tx_a);
        term.lock().subscribe(2, tx_b);

        term.lock().process(b"a");
        term.lock().process(b"b");

        for rx in [&mut rx_a, &mut rx_b] {
            let snap = expect_snapshot(rx.try_recv().unwrap());
            let mut seqs = vec![snap.seq];
            while let Ok(ServerMessage::GridDelta(delta)) = rx.try_recv() {
                seqs.push(delta.seq);
            }
            assert_eq!(seqs, vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_full_observer_is_resynced() {
        let term = terminal(20, 5);
        let (tx, mut rx) = mpsc::channel(1);
        term.lock().subscribe(1, tx);

        // Queue still holds the snapshot, so this delta is skipped
        term.lock().process(b"x");
        assert!(term.lock().has_stale());

        expect_snapshot(rx.try_recv().unwrap());
        term.lock().process(b"y");
        assert!(!term.lock().has_stale());

        let snap = expect_snapshot(rx.try_recv().unwrap());
        assert_eq!(snap.row_text(0), "xy");
        assert_eq!(snap.seq, 2);
    }

    #[test]
    fn test_quiet_pane_resync() {
        let term = terminal(20, 5);
        let (tx, mut rx) = mpsc::channel(1);
        term.lock().subscribe(1, tx);
        term.lock().process(b"x");

        expect_snapshot(rx.try_recv().unwrap());
        term.lock().resync_stale();
        let snap = expect_snapshot(rx.try_recv().unwrap());
        assert_eq!(snap.row_text(0), "x");
    }

    #[test]
    fn test_closed_observer_dropped() {
        let term = terminal(20, 5);
        let (tx, rx) = mpsc::channel(8);
        term.lock().subscribe(1, tx);
        drop(rx);

        term.lock().process(b"z");
        assert_eq!(term.lock().observer_count(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let term = terminal(20, 5);
        let (tx, _rx) = mpsc::channel(8);
        term.lock().subscribe(1, tx);
        assert!(term.lock().unsubscribe(1));
        assert!(!term.lock().unsubscribe(1));
    }

    #[test]
    fn test_resize_publishes_snapshot() {
        let term = terminal(20, 5);
        let (tx, mut rx) = mpsc::channel(8);
        term.lock().subscribe(1, tx);
        expect_snapshot(rx.try_recv().unwrap());

        term.lock().resize(30, 6);
        let snap = expect_snapshot(rx.try_recv().unwrap());
        assert_eq!((snap.cols, snap.rows), (30, 6));

        // Same size again publishes nothing
        term.lock().resize(30, 6);
        assert!(rx.try_recv().is_err());
    }

    // ==================== Pump Tests ====================

    #[tokio::test]
    async fn test_pump_feeds_grid_and_reports_eof() {
        let term = terminal(20, 5);
        let (mut pty_side, pane_side) = duplex(1024);
        let (sink, _unused) = duplex(1024);
        let (exit_tx, exit_rx) = oneshot::channel();

        let _io = PaneIo::start(Arc::clone(&term), pane_side, sink, None, move |status| {
            let _ = exit_tx.send(status);
        });

        pty_side.write_all(b"Hello").await.unwrap();
        drop(pty_side);

        let status = tokio::time::timeout(Duration::from_secs(2), exit_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status, None);
        assert_eq!(term.lock().grid().row_text(0), "Hello");
    }

    #[tokio::test]
    async fn test_pump_writes_replies_back() {
        let term = terminal(20, 5);
        let (mut pty_out, pane_out) = duplex(1024);
        let (pane_in, mut pty_in) = duplex(1024);

        let _io = PaneIo::start(Arc::clone(&term), pane_out, pane_in, None, |_| {});
        pty_out.write_all(b"\x1b[6n").await.unwrap();

        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(2), pty_in.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"\x1b[1;1R");
    }

    #[tokio::test]
    async fn test_stop_suppresses_exit_callback() {
        let term = terminal(20, 5);
        let (pty_side, pane_side) = duplex(64);
        let (sink, _unused) = duplex(64);
        let (exit_tx, exit_rx) = oneshot::channel::<Option<i32>>();

        let io = PaneIo::start(term, pane_side, sink, None, move |status| {
            let _ = exit_tx.send(status);
        });
        io.stop();
        drop(pty_side);

        // The callback is dropped without being called
        assert!(tokio::time::timeout(Duration::from_secs(2), exit_rx)
            .await
            .unwrap()
            .is_err());
    }

    // ==================== Input Tests ====================

    #[tokio::test]
    async fn test_input_from_two_clients_keeps_arrival_order() {
        let term = terminal(20, 5);
        let (_pty_out, pane_out) = duplex(64);
        let (pane_in, mut pty_in) = duplex(1024);
        let io = PaneIo::start(term, pane_out, pane_in, None, |_| {});

        let first = io.input();
        let second = io.input();
        let mut expected = Vec::new();
        for i in 0..20u8 {
            let (sender, chunk) = if i % 2 == 0 {
                (&first, vec![b'a' + i])
            } else {
                (&second, vec![b'A' + i])
            };
            expected.extend_from_slice(&chunk);
            sender.send(chunk).await.unwrap();
        }

        let mut got = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(2), pty_in.read_exact(&mut got))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, expected);
    }
}
