//! File watcher for configuration hot-reload
//!
//! Changed `[options]` entries are applied by queueing `set-option`
//! commands, so reloads are ordered with everything else. Other sections
//! are swapped into the shared handle and read by new connections.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use weft_utils::{Result, WeftError};

use crate::commands::{Command, CommandQueue, Origin};
use crate::options::OptionScope;

use super::{AppConfig, ConfigHandle, ConfigLoader};

/// Watches the configuration file for changes
pub struct ConfigWatcher {
    path: PathBuf,
    rx: mpsc::UnboundedReceiver<std::result::Result<Vec<Event>, String>>,
    /// Debouncer handle (kept alive)
    _debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
}

impl ConfigWatcher {
    /// Watch `path`. Its directory must exist; the file itself may not.
    pub fn new(path: PathBuf) -> Result<Self> {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| WeftError::config(format!("no directory for {}", path.display())))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(
            Duration::from_millis(100),
            None,
            move |result: DebounceEventResult| {
                let events = result
                    .map(|events| events.into_iter().map(|e| e.event).collect())
                    .map_err(|errs| format!("{:?}", errs));
                let _ = tx.send(events);
            },
        )
        .map_err(|e| WeftError::config(format!("failed to create watcher: {}", e)))?;

        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| WeftError::config(format!("failed to watch {}: {}", dir.display(), e)))?;

        Ok(Self {
            path,
            rx,
            _debouncer: debouncer,
        })
    }

    /// Reload on every change until `shutdown` fires
    pub async fn run(mut self, config: ConfigHandle, queue: CommandQueue, shutdown: CancellationToken) {
        info!(path = %self.path.display(), "config watcher started");
        loop {
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.rx.recv() => match result {
                    Some(result) => result,
                    None => break,
                },
            };
            match result {
                Ok(events) => {
                    if events.iter().any(|e| self.is_config_change(e)) {
                        self.reload(&config, &queue);
                    }
                }
                Err(e) => error!(error = %e, "config watch error"),
            }
        }
    }

    fn is_config_change(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
            && event
                .paths
                .iter()
                .any(|p| p.file_name().is_some() && p.file_name() == self.path.file_name())
    }

    fn reload(&self, config: &ConfigHandle, queue: &CommandQueue) {
        let fresh = match ConfigLoader::load_from_path(&self.path)
            .and_then(|c| ConfigLoader::validate(&c).map(|_| c))
        {
            Ok(fresh) => fresh,
            Err(e) => {
                error!(error = %e, "config reload failed, keeping previous");
                return;
            }
        };

        let old = config.load_full();
        if old.relay != fresh.relay {
            warn!("relay settings changed, restart the server to apply");
        }
        if old.server.label != fresh.server.label {
            warn!("socket label changed, restart the server to apply");
        }
        for command in option_changes(&old, &fresh) {
            queue.push(command, Origin::server());
        }
        config.store(std::sync::Arc::new(fresh));
        info!("configuration reloaded");
    }
}

/// `set-option -g` commands turning the options of `old` into those of
/// `new`. Options dropped from the file return to their defaults.
pub fn option_changes(old: &AppConfig, new: &AppConfig) -> Vec<Command> {
    let old_values = old.option_values();
    let new_values = new.option_values();

    let mut commands: Vec<Command> = new_values
        .iter()
        .filter(|entry| !old_values.contains(entry))
        .map(|(name, value)| Command::SetOption {
            scope: Some(OptionScope::Server),
            target: None,
            unset: false,
            name: name.clone(),
            value: Some(value.clone()),
        })
        .collect();
    commands.extend(
        old_values
            .iter()
            .filter(|(name, _)| !new.options.contains_key(name))
            .map(|(name, _)| Command::SetOption {
                scope: Some(OptionScope::Server),
                target: None,
                unset: true,
                name: name.clone(),
                value: None,
            }),
    );
    commands
}
