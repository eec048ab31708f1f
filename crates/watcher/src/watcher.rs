//! Notify-backed event source
//!
//! Connects the operating system watcher to the coalescer: notify delivers
//! events on its own thread, they are converted to [`ChangeEvent`]s and
//! queued into a bounded channel drained by the coalescer task.

use crate::{
    coalescer::EventCoalescer,
    config::WatcherConfig,
    events::{ChangeEvent, ReloadTick},
    ignore::IgnoreMatcher,
    watch_set::WatchSet,
};
use notify::{Config as NotifyConfig, Event as NotifyEvent, RecommendedWatcher, Watcher as _};
use reloadwatch_core::error::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

/// Main file system watcher
pub struct FileWatcher {
    /// Configuration
    config: Arc<WatcherConfig>,
    /// Ignore rules shared by the walk and the event path
    matcher: Arc<IgnoreMatcher>,
}

impl FileWatcher {
    /// Create a new file watcher, compiling the configured ignore patterns
    pub fn new(config: WatcherConfig) -> Self {
        let matcher = IgnoreMatcher::from_patterns(&config.ignore_patterns);
        Self {
            config: Arc::new(config),
            matcher: Arc::new(matcher),
        }
    }

    /// The compiled ignore rules
    pub fn matcher(&self) -> &Arc<IgnoreMatcher> {
        &self.matcher
    }

    /// Set up watching of `root` without starting the coalescing loop
    ///
    /// Fails only when the OS watcher itself cannot be created. Problems with
    /// individual directories are logged and skipped.
    pub fn watch(
        &self,
        root: impl AsRef<Path>,
    ) -> Result<(
        EventCoalescer<RecommendedWatcher>,
        mpsc::Receiver<ChangeEvent>,
        mpsc::Receiver<ReloadTick>,
    )> {
        let root = root.as_ref();
        let (event_tx, event_rx) = mpsc::channel(self.config.max_queue_size);
        let (tick_tx, tick_rx) = mpsc::channel(self.config.tick_capacity.max(1));

        let watcher = Self::create_notify_watcher(event_tx)?;
        let watch_set = WatchSet::initialize(root, Arc::clone(&self.matcher), watcher);

        let coalescer = EventCoalescer::new(
            Arc::clone(&self.matcher),
            watch_set,
            self.config.window(),
            tick_tx,
        );
        Ok((coalescer, event_rx, tick_rx))
    }

    /// Watch `root` and run the coalescing loop on a background task
    ///
    /// Returns the stream of reload ticks and the handle of the task.
    pub fn spawn(
        &self,
        root: impl AsRef<Path>,
    ) -> Result<(mpsc::Receiver<ReloadTick>, JoinHandle<()>)> {
        let (coalescer, event_rx, tick_rx) = self.watch(root)?;
        info!(
            "Coalescing filesystem events every {}ms",
            self.config.window_ms
        );
        let handle = tokio::spawn(coalescer.run(event_rx));
        Ok((tick_rx, handle))
    }

    /// Create a notify watcher feeding `tx`
    fn create_notify_watcher(tx: mpsc::Sender<ChangeEvent>) -> Result<RecommendedWatcher> {
        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    for change in ChangeEvent::from_notify(event) {
                        match tx.try_send(change) {
                            Ok(()) => {}
                            Err(TrySendError::Full(change)) => {
                                warn!("Event queue full, dropping event for {:?}", change.path());
                            }
                            Err(TrySendError::Closed(_)) => {
                                trace!("Event queue closed");
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Notify error: {}", e);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::watcher(format!("Failed to create watcher: {e}")))?;

        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch_set::tests::site_dir;

    #[tokio::test]
    async fn test_watch_seeds_watch_set() {
        let root = site_dir();
        std::fs::create_dir(root.path().join("css")).expect("test setup failed");
        std::fs::create_dir(root.path().join(".git")).expect("test setup failed");

        let watcher = FileWatcher::new(WatcherConfig::default());
        let (coalescer, _events, _ticks) = watcher.watch(root.path()).expect("test setup failed");

        let watch_set = coalescer.watch_set();
        assert_eq!(watch_set.len(), 2);
        assert!(watch_set.contains(&root.path().join("css")));
        assert!(!watch_set.contains(&root.path().join(".git")));
    }

    #[test]
    fn test_matcher_uses_configured_patterns() {
        let config = WatcherConfig::builder()
            .ignore_patterns(vec![r"\.log$".to_string(), "(".to_string()])
            .build();
        let watcher = FileWatcher::new(config);

        assert_eq!(watcher.matcher().pattern_count(), 1);
        assert!(watcher.matcher().should_ignore(Path::new("app.log")));
    }
}
