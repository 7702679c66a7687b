//! Pane id to pty bookkeeping

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::warn;
use weft_protocol::PaneId;
use weft_utils::Result;

use super::{PtyChannel, PtyConfig};

/// Owns every pane's pty
#[derive(Debug, Default)]
pub struct PtyManager {
    channels: HashMap<PaneId, PtyChannel>,
}

impl PtyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a process for `pane_id`, replacing any previous one.
    pub fn spawn(&mut self, pane_id: PaneId, config: &PtyConfig) -> Result<&PtyChannel> {
        let channel = PtyChannel::open(config)?;
        match self.channels.entry(pane_id) {
            Entry::Occupied(mut slot) => {
                let old = slot.insert(channel);
                if let Err(e) = old.kill() {
                    warn!(pane_id = %pane_id, error = %e, "failed to kill replaced process");
                }
                Ok(slot.into_mut())
            }
            Entry::Vacant(slot) => Ok(slot.insert(channel)),
        }
    }

    pub fn remove(&mut self, pane_id: PaneId) -> Option<PtyChannel> {
        self.channels.remove(&pane_id)
    }

    #[cfg(test)]
    pub fn contains(&self, pane_id: PaneId) -> bool {
        self.channels.contains_key(&pane_id)
    }

    #[cfg(test)]
    pub fn pane_ids(&self) -> Vec<PaneId> {
        self.channels.keys().copied().collect()
    }

    #[cfg(test)]
    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// Resize a pane's terminal if it has one
    pub fn resize(&self, pane_id: PaneId, cols: u16, rows: u16) -> Result<()> {
        match self.channels.get(&pane_id) {
            Some(channel) => channel.resize(cols, rows),
            None => Ok(()),
        }
    }

    /// Kill and forget a pane's process
    pub fn kill(&mut self, pane_id: PaneId) {
        if let Some(channel) = self.channels.remove(&pane_id) {
            if let Err(e) = channel.kill() {
                warn!(pane_id = %pane_id, error = %e, "failed to kill pane process");
            }
        }
    }

    pub fn kill_all(&mut self) {
        for (pane_id, channel) in self.channels.drain() {
            if let Err(e) = channel.kill() {
                warn!(pane_id = %pane_id, error = %e, "failed to kill pane process");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_new() {
        let manager = PtyManager::new();
        assert_eq!(manager.count(), 0);
    }

    #[tokio::test]
    async fn test_manager_spawn_and_remove() {
        let mut manager = PtyManager::new();
        let pane_id = PaneId(1);

        manager
            .spawn(pane_id, &PtyConfig::command("echo").with_arg("hello"))
            .unwrap();
        assert_eq!(manager.count(), 1);
        assert!(manager.contains(pane_id));
        assert_eq!(manager.pane_ids(), vec![pane_id]);

        assert!(manager.remove(pane_id).is_some());
        assert_eq!(manager.count(), 0);
    }

    #[tokio::test]
    async fn test_manager_resize_missing_pane_is_ok() {
        let manager = PtyManager::new();
        assert!(manager.resize(PaneId(9), 10, 10).is_ok());
    }

    #[tokio::test]
    async fn test_manager_kill_all() {
        let mut manager = PtyManager::new();
        manager.spawn(PaneId(1), &PtyConfig::command("cat")).unwrap();
        manager.spawn(PaneId(2), &PtyConfig::command("cat")).unwrap();
        manager.kill_all();
        assert_eq!(manager.count(), 0);
    }
}
