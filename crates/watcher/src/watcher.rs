//! Filesystem subscription
//!
//! This module wraps a recursive notify watcher and forwards converted
//! [`ChangeEvent`]s into a bounded tokio channel. No filtering happens here;
//! the consumer decides what is relevant.

use crate::{config::WatcherConfig, events::ChangeEvent};
use nodemon_core::error::{Error, Result};
use notify::{
    Config as NotifyConfig, Event as NotifyEvent, RecommendedWatcher, RecursiveMode,
    Watcher as NotifyWatcher,
};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, trace, warn};

/// Owns the notify subscription for one watch root
pub struct FileWatcher {
    /// Configuration
    config: WatcherConfig,
    /// Active notify watcher
    watcher: Option<RecommendedWatcher>,
    /// Paths being watched
    watched_paths: Vec<PathBuf>,
}

impl FileWatcher {
    /// Create a new file watcher
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            watcher: None,
            watched_paths: Vec::new(),
        }
    }

    /// Start watching a directory tree
    ///
    /// Fails with a watcher error when the path does not exist or the
    /// backend refuses the subscription. A second call while a subscription
    /// is active is rejected.
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<mpsc::Receiver<ChangeEvent>> {
        let path = path.as_ref().to_path_buf();

        if self.watcher.is_some() {
            return Err(Error::watcher(format!(
                "Already watching {:?}; stop the current subscription first",
                self.watched_paths
            )));
        }

        if !path.exists() {
            return Err(Error::watcher(format!(
                "Failed to watch path {path:?}: path does not exist"
            )));
        }

        let (tx, rx) = mpsc::channel(self.config.max_queue_size.max(1));
        let mut watcher = self.create_notify_watcher(tx)?;

        watcher
            .watch(&path, RecursiveMode::Recursive)
            .map_err(|e| Error::watcher(format!("Failed to watch path {path:?}: {e}")))?;

        info!("Watching path: {:?} (recursive)", path);
        self.watcher = Some(watcher);
        self.watched_paths.push(path);

        Ok(rx)
    }

    /// Create a notify watcher
    fn create_notify_watcher(&self, tx: mpsc::Sender<ChangeEvent>) -> Result<RecommendedWatcher> {
        let config = NotifyConfig::default()
            .with_poll_interval(self.config.poll_interval())
            .with_compare_contents(false);

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    trace!("Received notify event: {:?}", event);
                    for change in ChangeEvent::from_notify(&event) {
                        match tx.try_send(change) {
                            Ok(()) => {}
                            Err(TrySendError::Full(change)) => {
                                warn!("Change queue full, dropping event for {:?}", change.path);
                            }
                            Err(TrySendError::Closed(_)) => {
                                debug!("Change receiver dropped");
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Notify error: {}", e);
                }
            },
            config,
        )
        .map_err(|e| Error::watcher(format!("Failed to create watcher: {e}")))?;

        Ok(watcher)
    }

    /// Tear down the subscription
    ///
    /// Returns `false` when there was nothing to stop; calling it again is a no-op.
    pub fn stop(&mut self) -> bool {
        let Some(mut watcher) = self.watcher.take() else {
            return false;
        };

        for path in self.watched_paths.drain(..) {
            if let Err(e) = watcher.unwatch(&path) {
                debug!("Failed to unwatch {:?}: {}", path, e);
            }
        }
        drop(watcher);
        info!("File watcher stopped");
        true
    }

    /// Get currently watched paths
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched_paths
    }

    /// Check if a path is being watched
    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths.iter().any(|p| path.starts_with(p))
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
