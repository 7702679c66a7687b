//! Configuration schema structs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use weft_protocol::Dimensions;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    /// Initial server-wide option values, e.g. `history-limit = 5000`
    pub options: BTreeMap<String, toml::Value>,
}

impl AppConfig {
    /// `[options]` entries rendered the way `set-option` takes them
    pub fn option_values(&self) -> Vec<(String, String)> {
        self.options
            .iter()
            .map(|(name, value)| (name.clone(), option_string(value)))
            .collect()
    }
}

/// Render a TOML value as an option string. Booleans become on/off and
/// arrays are joined with spaces.
pub fn option_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Boolean(b) => if *b { "on" } else { "off" }.to_string(),
        toml::Value::Array(items) => items
            .iter()
            .map(option_string)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Server daemon settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket label used when neither `--socket` nor `-L` is given
    pub label: Option<String>,
    /// How long a new connection may take to send `Connect`
    pub attach_timeout_ms: u64,
    /// Outbound messages buffered per client before it is marked stale
    pub client_queue_depth: usize,
    /// Size of sessions created without a client
    pub default_cols: u16,
    pub default_rows: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            label: None,
            attach_timeout_ms: 5000,
            client_queue_depth: 256,
            default_cols: 80,
            default_rows: 24,
        }
    }
}

impl ServerConfig {
    pub fn default_size(&self) -> Dimensions {
        Dimensions::new(self.default_cols, self.default_rows)
    }
}

/// Remote relay listener
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to accept relay peers on, e.g. `127.0.0.1:7711`. No listener
    /// when unset.
    pub listen: Option<String>,
    /// Token granting read-write access
    pub token_rw: Option<String>,
    /// Token granting read-only access
    pub token_ro: Option<String>,
}

impl RelayConfig {
    pub fn enabled(&self) -> bool {
        self.listen.is_some()
    }
}
