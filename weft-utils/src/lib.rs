//! weft-utils: Common utilities shared across weft crates
//!
//! This crate provides:
//! - Unified error types ([`WeftError`], [`Result`])
//! - Logging infrastructure ([`init_logging`], [`LogConfig`])
//! - Socket and XDG path resolution ([`paths`] module)
//! - Process environment helpers ([`env`] module)

pub mod env;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Result, WeftError};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};

pub use paths::{
    config_dir, config_file, log_dir, runtime_dir, socket_dir, socket_path,
    socket_path_for_label, state_dir, DEFAULT_LABEL,
};
