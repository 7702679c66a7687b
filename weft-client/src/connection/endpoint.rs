//! Server addresses

use std::fmt;
use std::path::PathBuf;

use url::Url;
use weft_utils::{Result, WeftError};

/// Where the server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local control socket
    Unix(PathBuf),
    /// Relay listener, as `host:port`
    Tcp(String),
}

impl Endpoint {
    /// Parse `tcp://host:port`, `unix://path` or a bare socket path
    pub fn parse(addr: &str) -> Result<Self> {
        if addr.starts_with("tcp://") {
            let url = Url::parse(addr)
                .map_err(|e| WeftError::connection(format!("invalid TCP address '{}': {}", addr, e)))?;
            let host = url
                .host_str()
                .ok_or_else(|| WeftError::connection(format!("missing host in '{}'", addr)))?;
            let port = url
                .port()
                .ok_or_else(|| WeftError::connection(format!("missing port in '{}'", addr)))?;
            Ok(Endpoint::Tcp(format!("{}:{}", host, port)))
        } else if addr.starts_with("unix://") {
            let url = Url::parse(addr)
                .map_err(|e| WeftError::connection(format!("invalid socket address '{}': {}", addr, e)))?;
            if url.path().is_empty() {
                return Err(WeftError::connection(format!("missing path in '{}'", addr)));
            }
            Ok(Endpoint::Unix(PathBuf::from(url.path())))
        } else if addr.contains("://") {
            Err(WeftError::connection(format!("unsupported address '{}'", addr)))
        } else {
            Ok(Endpoint::Unix(PathBuf::from(addr)))
        }
    }

    #[cfg(test)]
    pub fn is_local(&self) -> bool {
        matches!(self, Endpoint::Unix(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}
