//! Error types for weft
//!
//! Provides a unified error type used across all weft crates.

use std::path::PathBuf;

/// Main error type for weft operations
#[derive(Debug, thiserror::Error)]
pub enum WeftError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("No server running at {path}")]
    ServerNotRunning { path: PathBuf },

    #[error("Connection timeout after {millis}ms")]
    ConnectionTimeout { millis: u64 },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Unsafe socket directory {path}: {reason}")]
    UnsafeSocketDir { path: PathBuf, reason: String },

    // === Protocol Errors ===

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Protocol version mismatch: client={client}, server={server}")]
    ProtocolMismatch { client: u32, server: u32 },

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    // === Session Errors ===

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("Pane not found: {0}")]
    PaneNotFound(String),

    #[error("Session already exists: {0}")]
    SessionExists(String),

    // === PTY Errors ===

    #[error("PTY error: {0}")]
    Pty(String),

    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WeftError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a PTY error
    pub fn pty(msg: impl Into<String>) -> Self {
        Self::Pty(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Resource errors are reported once and never retried.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            Self::Pty(_) | Self::ProcessSpawn(_) | Self::Bind { .. }
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::Connection(_)
        )
    }
}

/// Result type alias using WeftError
pub type Result<T> = std::result::Result<T, WeftError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Display Tests ====================

    #[test]
    fn test_error_display() {
        let err = WeftError::SessionNotFound("work".into());
        assert_eq!(err.to_string(), "Session not found: work");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = WeftError::Io(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = WeftError::FileRead {
            path: PathBuf::from("/etc/weft.toml"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/etc/weft.toml"));
    }

    #[test]
    fn test_error_display_server_not_running() {
        let err = WeftError::ServerNotRunning {
            path: PathBuf::from("/tmp/weft-1000/default"),
        };
        let msg = err.to_string();
        assert!(msg.contains("No server running"));
        assert!(msg.contains("/tmp/weft-1000/default"));
    }

    #[test]
    fn test_error_display_timeout() {
        let err = WeftError::ConnectionTimeout { millis: 5000 };
        assert_eq!(err.to_string(), "Connection timeout after 5000ms");
    }

    #[test]
    fn test_error_display_protocol_mismatch() {
        let err = WeftError::ProtocolMismatch { client: 2, server: 1 };
        assert_eq!(
            err.to_string(),
            "Protocol version mismatch: client=2, server=1"
        );
    }

    #[test]
    fn test_error_display_unsafe_socket_dir() {
        let err = WeftError::UnsafeSocketDir {
            path: PathBuf::from("/tmp/weft-0"),
            reason: "not owned by uid".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/weft-0"));
        assert!(msg.contains("not owned by uid"));
    }

    // ==================== Constructor Tests ====================

    #[test]
    fn test_helper_constructors() {
        assert!(matches!(WeftError::connection("x"), WeftError::Connection(_)));
        assert!(matches!(WeftError::protocol("x"), WeftError::Protocol(_)));
        assert!(matches!(WeftError::config("x"), WeftError::Config(_)));
        assert!(matches!(WeftError::pty("x"), WeftError::Pty(_)));
        assert!(matches!(WeftError::internal("x"), WeftError::Internal(_)));
    }

    #[test]
    fn test_io_from() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(WeftError::Io(_))));
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_resource_errors() {
        assert!(WeftError::pty("openpty failed").is_resource());
        assert!(WeftError::ProcessSpawn("sh".into()).is_resource());
        assert!(!WeftError::SessionNotFound("a".into()).is_resource());
    }

    #[test]
    fn test_is_retryable() {
        assert!(WeftError::ConnectionTimeout { millis: 1 }.is_retryable());
        assert!(WeftError::connection("refused").is_retryable());
        assert!(!WeftError::ConnectionClosed.is_retryable());
        assert!(!WeftError::pty("x").is_retryable());
    }
}
