//! Connection to a weft server

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use uuid::Uuid;

use weft_protocol::{
    AccessMode, Capabilities, ClientCodec, ClientMessage, ColorDepth, Dimensions, ErrorCode,
    ServerMessage, PROTOCOL_VERSION,
};
use weft_utils::env::{environment_snapshot, locale_is_utf8};
use weft_utils::{Result, WeftError};

use super::Endpoint;

/// Bound on establishing a relay TCP connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on waiting for `Connected`
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

const CHANNEL_DEPTH: usize = 256;

/// Trait alias for streams that can be used with Framed
pub trait StreamTrait: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> StreamTrait for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the client tells the server about itself
#[derive(Debug, Clone)]
pub struct Hello {
    pub name: String,
    pub size: Dimensions,
    pub capabilities: Capabilities,
    pub environment: Vec<(String, String)>,
    pub token: Option<String>,
}

impl Hello {
    /// Describe this process and its controlling terminal
    pub fn from_environment(size: Dimensions, token: Option<String>) -> Self {
        Self {
            name: tty_name(),
            size,
            capabilities: Capabilities {
                color_depth: color_depth_with(|name| std::env::var(name).ok()),
                utf8: locale_is_utf8(),
            },
            environment: environment_snapshot(),
            token,
        }
    }
}

/// The server's answer to `Connect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
    pub client_id: u64,
    pub access: AccessMode,
    pub server_version: String,
}

/// Name of the terminal on stdin, or a placeholder
fn tty_name() -> String {
    std::fs::read_link("/proc/self/fd/0")
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| p.starts_with("/dev/"))
        .unwrap_or_else(|| format!("client-{}", std::process::id()))
}

/// Colour support implied by `COLORTERM` and `TERM`
pub fn color_depth_with<F>(get: F) -> ColorDepth
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(colorterm) = get("COLORTERM") {
        if colorterm == "truecolor" || colorterm == "24bit" {
            return ColorDepth::TrueColor;
        }
    }
    match get("TERM") {
        Some(term) if term == "dumb" => ColorDepth::Mono,
        Some(term) if term.contains("256color") => ColorDepth::Ansi256,
        Some(term) if term.contains("direct") => ColorDepth::TrueColor,
        _ => ColorDepth::Ansi16,
    }
}

/// Client connection to a weft server
pub struct Connection {
    endpoint: Endpoint,
    state: ConnectionState,
    tx: mpsc::Sender<ClientMessage>,
    rx: mpsc::Receiver<ServerMessage>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Connection {
    /// Create a connection (not yet connected)
    pub fn new(endpoint: Endpoint) -> Self {
        let (tx, _) = mpsc::channel(1);
        let (_, rx) = mpsc::channel(1);
        Self {
            endpoint,
            state: ConnectionState::Disconnected,
            tx,
            rx,
            task_handle: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Open the transport
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }
        self.state = ConnectionState::Connecting;

        let stream = match self.open().await {
            Ok(stream) => stream,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };
        let framed = Framed::new(stream, ClientCodec::new());

        let (outgoing_tx, outgoing_rx) = mpsc::channel::<ClientMessage>(CHANNEL_DEPTH);
        let (incoming_tx, incoming_rx) = mpsc::channel::<ServerMessage>(CHANNEL_DEPTH);
        self.tx = outgoing_tx;
        self.rx = incoming_rx;
        self.task_handle = Some(tokio::spawn(Self::connection_task(
            framed,
            outgoing_rx,
            incoming_tx,
        )));

        self.state = ConnectionState::Connected;
        tracing::debug!(endpoint = %self.endpoint, "connected");
        Ok(())
    }

    async fn open(&self) -> Result<Box<dyn StreamTrait>> {
        match &self.endpoint {
            Endpoint::Unix(path) => {
                if !path.exists() {
                    return Err(WeftError::ServerNotRunning { path: path.clone() });
                }
                let stream = UnixStream::connect(path).await.map_err(|e| {
                    WeftError::connection(format!("failed to connect to {}: {}", path.display(), e))
                })?;
                Ok(Box::new(stream))
            }
            Endpoint::Tcp(addr) => {
                let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
                    .await
                    .map_err(|_| WeftError::ConnectionTimeout {
                        millis: CONNECT_TIMEOUT.as_millis() as u64,
                    })?
                    .map_err(|e| WeftError::connection(format!("failed to connect to {}: {}", addr, e)))?;
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(error = %e, "set_nodelay failed");
                }
                Ok(Box::new(stream))
            }
        }
    }

    /// Introduce this client. Must be the first exchange on a connection.
    pub async fn handshake(&mut self, hello: Hello) -> Result<Welcome> {
        self.send(ClientMessage::Connect {
            client_id: Uuid::new_v4(),
            protocol_version: PROTOCOL_VERSION,
            name: hello.name,
            size: hello.size,
            capabilities: hello.capabilities,
            environment: hello.environment,
            token: hello.token,
        })
        .await?;

        let reply = tokio::time::timeout(HANDSHAKE_TIMEOUT, self.rx.recv())
            .await
            .map_err(|_| WeftError::ConnectionTimeout {
                millis: HANDSHAKE_TIMEOUT.as_millis() as u64,
            })?;
        match reply {
            Some(ServerMessage::Connected {
                server_version,
                protocol_version,
                client_id,
                access,
            }) => {
                if protocol_version != PROTOCOL_VERSION {
                    return Err(WeftError::ProtocolMismatch {
                        client: PROTOCOL_VERSION,
                        server: protocol_version,
                    });
                }
                tracing::info!(client_id, ?access, %server_version, "handshake complete");
                Ok(Welcome {
                    client_id,
                    access,
                    server_version,
                })
            }
            Some(ServerMessage::Error {
                code: ErrorCode::ProtocolMismatch,
                message,
            }) => Err(WeftError::protocol(message)),
            Some(ServerMessage::Error { code, message }) => {
                Err(WeftError::connection(format!("{:?}: {}", code, message)))
            }
            Some(other) => Err(WeftError::InvalidMessage(format!(
                "expected Connected, got {:?}",
                other
            ))),
            None => Err(WeftError::ConnectionClosed),
        }
    }

    pub async fn disconnect(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
        self.state = ConnectionState::Disconnected;
    }

    pub async fn send(&self, msg: ClientMessage) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(WeftError::connection("not connected"));
        }
        self.tx
            .send(msg)
            .await
            .map_err(|_| WeftError::ConnectionClosed)
    }

    /// Next message from the server; `None` once the connection is gone
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.rx.recv().await
    }

    /// Background task that handles the socket I/O
    async fn connection_task(
        mut framed: Framed<Box<dyn StreamTrait>, ClientCodec>,
        mut outgoing: mpsc::Receiver<ClientMessage>,
        incoming: mpsc::Sender<ServerMessage>,
    ) {
        loop {
            tokio::select! {
                msg = outgoing.recv() => {
                    let Some(msg) = msg else {
                        tracing::debug!("outgoing channel closed");
                        break;
                    };
                    if let Err(e) = framed.send(msg).await {
                        tracing::error!("failed to send message: {}", e);
                        break;
                    }
                }
                result = framed.next() => {
                    match result {
                        Some(Ok(msg)) => {
                            tracing::trace!(message = ?std::mem::discriminant(&msg), "received");
                            if incoming.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!("failed to receive message: {}", e);
                            break;
                        }
                        None => {
                            tracing::info!("server closed connection");
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::net::UnixListener;
    use weft_protocol::ServerCodec;

    fn hello() -> Hello {
        Hello {
            name: "/dev/pts/4".into(),
            size: Dimensions::new(100, 30),
            capabilities: Capabilities::default(),
            environment: vec![("TERM".into(), "xterm".into())],
            token: None,
        }
    }

    /// Accept one client and answer its first message with `reply`
    async fn fake_server(listener: UnixListener, reply: ServerMessage) -> ClientMessage {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, ServerCodec::new());
        let first = framed.next().await.unwrap().unwrap();
        framed.send(reply).await.unwrap();
        // Keep the socket open until the client has read the reply
        let _ = framed.next().await;
        first
    }

    // ==================== Connect Tests ====================

    #[tokio::test]
    async fn test_connect_no_server() {
        let mut conn = Connection::new(Endpoint::Unix("/nonexistent/weft.sock".into()));
        let err = conn.connect().await.unwrap_err();
        assert!(matches!(err, WeftError::ServerNotRunning { .. }));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_not_connected() {
        let conn = Connection::new(Endpoint::Unix("/tmp/unused".into()));
        assert!(conn.send(ClientMessage::Ping).await.is_err());
    }

    #[tokio::test]
    async fn test_tcp_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let mut conn = Connection::new(Endpoint::Tcp(addr.to_string()));
        assert!(conn.connect().await.is_err());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    // ==================== Handshake Tests ====================

    #[tokio::test]
    async fn test_handshake_sends_connect_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(fake_server(
            listener,
            ServerMessage::Connected {
                server_version: "0.1.0".into(),
                protocol_version: PROTOCOL_VERSION,
                client_id: 7,
                access: AccessMode::ReadWrite,
            },
        ));

        let mut conn = Connection::new(Endpoint::Unix(path));
        conn.connect().await.unwrap();
        let welcome = conn.handshake(hello()).await.unwrap();
        assert_eq!(welcome.client_id, 7);
        assert_eq!(welcome.access, AccessMode::ReadWrite);
        conn.disconnect().await;

        match server.await.unwrap() {
            ClientMessage::Connect {
                protocol_version,
                name,
                size,
                ..
            } => {
                assert_eq!(protocol_version, PROTOCOL_VERSION);
                assert_eq!(name, "/dev/pts/4");
                assert_eq!(size, Dimensions::new(100, 30));
            }
            other => panic!("expected Connect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handshake_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(fake_server(
            listener,
            ServerMessage::Error {
                code: ErrorCode::ProtocolMismatch,
                message: "protocol version 9 not supported".into(),
            },
        ));

        let mut conn = Connection::new(Endpoint::Unix(path));
        conn.connect().await.unwrap();
        let err = conn.handshake(hello()).await.unwrap_err();
        assert!(matches!(err, WeftError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_handshake_version_mismatch_in_reply() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(fake_server(
            listener,
            ServerMessage::Connected {
                server_version: "9.0.0".into(),
                protocol_version: PROTOCOL_VERSION + 1,
                client_id: 1,
                access: AccessMode::ReadOnly,
            },
        ));

        let mut conn = Connection::new(Endpoint::Unix(path));
        conn.connect().await.unwrap();
        assert!(matches!(
            conn.handshake(hello()).await.unwrap_err(),
            WeftError::ProtocolMismatch { .. }
        ));
    }

    #[tokio::test]
    async fn test_recv_none_after_server_closes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut conn = Connection::new(Endpoint::Unix(path));
        conn.connect().await.unwrap();
        server.await.unwrap();
        assert!(conn.recv().await.is_none());
    }

    // ==================== Capability Tests ====================

    #[test]
    fn test_color_depth_detection() {
        let env = |pairs: &'static [(&'static str, &'static str)]| {
            move |name: &str| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
            }
        };
        assert_eq!(
            color_depth_with(env(&[("COLORTERM", "truecolor"), ("TERM", "xterm")])),
            ColorDepth::TrueColor
        );
        assert_eq!(
            color_depth_with(env(&[("TERM", "screen-256color")])),
            ColorDepth::Ansi256
        );
        assert_eq!(color_depth_with(env(&[("TERM", "dumb")])), ColorDepth::Mono);
        assert_eq!(color_depth_with(env(&[("TERM", "xterm")])), ColorDepth::Ansi16);
        assert_eq!(color_depth_with(env(&[])), ColorDepth::Ansi16);
    }
}
