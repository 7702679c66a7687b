//! Configuration management for the weft server
//!
//! The loaded configuration is shared through an `ArcSwap` so connection
//! handlers always read the latest snapshot without locking.

mod loader;
mod schema;
mod watcher;

pub use loader::ConfigLoader;
pub use schema::*;
pub use watcher::ConfigWatcher;

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Global configuration handle
pub type ConfigHandle = Arc<ArcSwap<AppConfig>>;

/// Create a config handle holding `config`
pub fn new_config_handle(config: AppConfig) -> ConfigHandle {
    Arc::new(ArcSwap::from_pointee(config))
}
