//! Window-based coalescing of change events
//!
//! Raw events accumulate in a per-path buffer for one window. At every window
//! boundary the buffer is drained and, when anything qualifying was seen, a
//! single [`ReloadTick`] is emitted. Editors typically produce several events
//! per save; they all collapse into one tick.

use crate::events::{ChangeEvent, ChangeKind, ReloadTick};
use crate::ignore::IgnoreMatcher;
use crate::watch_set::{normalize, WatchBackend, WatchSet};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// Events seen during the current window, keyed by normalized path
///
/// Later events for a path replace earlier ones.
#[derive(Debug, Default)]
pub struct PendingEventBuffer {
    events: HashMap<PathBuf, ChangeEvent>,
}

impl PendingEventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event, replacing any earlier one for the same path
    ///
    /// Events for editor temp files are rejected; returns whether the event
    /// was kept.
    pub fn insert(&mut self, event: ChangeEvent) -> bool {
        if IgnoreMatcher::is_temp_file(event.path()) {
            trace!("Dropping temp file event: {:?}", event.path());
            return false;
        }
        self.events.insert(normalize(event.path()), event);
        true
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Empty the buffer, returning the distinct qualifying paths in sorted order
    pub fn drain(&mut self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .events
            .drain()
            .map(|(path, _)| path)
            .filter(|path| !IgnoreMatcher::is_temp_file(path))
            .collect();
        paths.sort();
        paths
    }
}

/// Turns a stream of raw change events into at most one tick per window
pub struct EventCoalescer<B> {
    matcher: Arc<IgnoreMatcher>,
    watch_set: WatchSet<B>,
    pending: PendingEventBuffer,
    window: Duration,
    tick_tx: mpsc::Sender<ReloadTick>,
}

impl<B: WatchBackend> EventCoalescer<B> {
    pub fn new(
        matcher: Arc<IgnoreMatcher>,
        watch_set: WatchSet<B>,
        window: Duration,
        tick_tx: mpsc::Sender<ReloadTick>,
    ) -> Self {
        Self {
            matcher,
            watch_set,
            pending: PendingEventBuffer::new(),
            window,
            tick_tx,
        }
    }

    /// Apply one raw event to the current window
    pub async fn handle_event(&mut self, event: ChangeEvent) {
        trace!("Received change event: {:?}", event);

        match event.kind() {
            ChangeKind::Removed => {
                self.watch_set.remove(event.path());
                if !self.matcher.should_ignore(event.path()) {
                    self.pending.insert(event);
                }
            }
            ChangeKind::Changed => {
                let metadata = match tokio::fs::symlink_metadata(event.path()).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        debug!("Dropping event for {}: {}", event.path().display(), e);
                        return;
                    }
                };

                if metadata.is_dir() {
                    if self.watch_set.contains(event.path()) {
                        trace!("Already watching {}", event.path().display());
                    } else if !self.matcher.should_ignore(event.path()) {
                        self.watch_set.add(event.path());
                    }
                } else if !self.matcher.should_ignore(event.path()) {
                    self.pending.insert(event);
                }
            }
        }
    }

    /// Close the current window
    ///
    /// Returns a tick when the window saw at least one qualifying change. The
    /// buffer is empty afterwards either way.
    pub fn flush(&mut self) -> Option<ReloadTick> {
        let paths = self.pending.drain();
        if paths.is_empty() {
            return None;
        }
        debug!("Window closed with {} changed path(s)", paths.len());
        Some(ReloadTick { paths })
    }

    /// Number of events waiting in the current window
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The directories currently watched
    pub fn watch_set(&self) -> &WatchSet<B> {
        &self.watch_set
    }

    /// Run the coalescing loop until the raw event channel closes
    ///
    /// The remaining window is flushed once more before returning.
    pub async fn run(mut self, mut events: mpsc::Receiver<ChangeEvent>) {
        let mut ticker = interval(self.window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.emit() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        debug!("Raw event channel closed, flushing last window");
                        self.emit();
                        break;
                    }
                },
            }
        }
        debug!("Event coalescer stopped");
    }

    /// Flush the window and hand the tick to the consumer without waiting on it
    ///
    /// Returns `false` once the consumer is gone.
    fn emit(&mut self) -> bool {
        let Some(tick) = self.flush() else {
            return true;
        };
        match self.tick_tx.try_send(tick) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                // A reload is already queued and will cover these changes
                debug!("Reload already pending, merging window into it");
                true
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Reload consumer is gone, stopping event coalescer");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch_set::tests::{site_dir, RecordingBackend};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use tokio::time::timeout;

    fn coalescer(
        root: &Path,
        ignores: &str,
    ) -> (EventCoalescer<RecordingBackend>, mpsc::Receiver<ReloadTick>) {
        let matcher = Arc::new(IgnoreMatcher::from_list(ignores));
        let watch_set = WatchSet::initialize(root, Arc::clone(&matcher), RecordingBackend::default());
        let (tx, rx) = mpsc::channel(1);
        (
            EventCoalescer::new(matcher, watch_set, Duration::from_millis(100), tx),
            rx,
        )
    }

    fn changed(path: PathBuf) -> ChangeEvent {
        ChangeEvent::changed(path).expect("test setup failed")
    }

    fn removed(path: PathBuf) -> ChangeEvent {
        ChangeEvent::removed(path).expect("test setup failed")
    }

    #[test]
    fn test_buffer_last_write_wins() {
        let mut buffer = PendingEventBuffer::new();
        assert!(buffer.insert(changed(PathBuf::from("./a.txt"))));
        assert!(buffer.insert(removed(PathBuf::from("./a.txt"))));
        assert!(buffer.insert(changed(PathBuf::from(".//a.txt"))));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.drain(), vec![PathBuf::from("./a.txt")]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_buffer_rejects_temp_files() {
        let mut buffer = PendingEventBuffer::new();
        assert!(!buffer.insert(changed(PathBuf::from("./#index.html#"))));
        assert!(!buffer.insert(changed(PathBuf::from("./index.html#1"))));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_modifications_flush_once() {
        let root = site_dir();
        let file = root.path().join("a.txt");
        fs::write(&file, "v0").expect("test setup failed");
        let (mut coalescer, _rx) = coalescer(root.path(), "");

        for i in 0..5 {
            fs::write(&file, format!("v{i}")).expect("test setup failed");
            coalescer.handle_event(changed(file.clone())).await;
        }

        let tick = coalescer.flush().expect("expected a tick");
        assert_eq!(tick.paths, vec![file]);
        assert!(coalescer.flush().is_none());
    }

    #[tokio::test]
    async fn test_ignored_pattern_never_flushes() {
        let root = site_dir();
        let file = root.path().join("x.tmp");
        fs::write(&file, "").expect("test setup failed");
        let (mut coalescer, _rx) = coalescer(root.path(), r"\.tmp$");

        for _ in 0..4 {
            coalescer.handle_event(changed(file.clone())).await;
        }

        assert_eq!(coalescer.pending_count(), 0);
        assert!(coalescer.flush().is_none());
    }

    #[tokio::test]
    async fn test_pattern_exclusion_keeps_other_files() {
        let root = site_dir();
        let log = root.path().join("app.log");
        let txt = root.path().join("app.txt");
        fs::write(&log, "").expect("test setup failed");
        fs::write(&txt, "").expect("test setup failed");
        let (mut coalescer, _rx) = coalescer(root.path(), r"\.log$");

        coalescer.handle_event(changed(log)).await;
        coalescer.handle_event(changed(txt.clone())).await;

        assert_eq!(coalescer.flush().map(|t| t.paths), Some(vec![txt]));
    }

    #[tokio::test]
    async fn test_hidden_and_temp_files_never_flush() {
        let root = site_dir();
        let hidden = root.path().join(".index.html.swp");
        let temp = root.path().join("#index.html#");
        let temp_inner = root.path().join("index#.html");
        for path in [&hidden, &temp, &temp_inner] {
            fs::write(path, "").expect("test setup failed");
        }
        let (mut coalescer, _rx) = coalescer(root.path(), "");

        coalescer.handle_event(changed(hidden.clone())).await;
        coalescer.handle_event(changed(temp.clone())).await;
        coalescer.handle_event(changed(temp_inner)).await;
        coalescer.handle_event(removed(hidden)).await;
        coalescer.handle_event(removed(temp)).await;

        assert!(coalescer.flush().is_none());
    }

    #[tokio::test]
    async fn test_vanished_path_is_dropped() {
        let root = site_dir();
        let (mut coalescer, _rx) = coalescer(root.path(), "");

        coalescer
            .handle_event(changed(root.path().join("gone.html")))
            .await;

        assert!(coalescer.flush().is_none());
    }

    #[tokio::test]
    async fn test_deleted_file_flushes() {
        let root = site_dir();
        let (mut coalescer, _rx) = coalescer(root.path(), "");

        coalescer
            .handle_event(removed(root.path().join("old.html")))
            .await;

        assert_eq!(
            coalescer.flush().map(|t| t.paths),
            Some(vec![root.path().join("old.html")])
        );
    }

    #[tokio::test]
    async fn test_directory_lifecycle() {
        let root = site_dir();
        let (mut coalescer, _rx) = coalescer(root.path(), "");
        let sub = root.path().join("posts");

        fs::create_dir(&sub).expect("test setup failed");
        coalescer.handle_event(changed(sub.clone())).await;
        assert!(coalescer.watch_set().contains(&sub));
        // Directory events alone don't trigger a reload
        assert!(coalescer.flush().is_none());

        let post = sub.join("hello.html");
        fs::write(&post, "<h1>hi</h1>").expect("test setup failed");
        coalescer.handle_event(changed(post.clone())).await;
        assert_eq!(coalescer.flush().map(|t| t.paths), Some(vec![post]));

        fs::remove_dir_all(&sub).expect("test setup failed");
        coalescer.handle_event(removed(sub.clone())).await;
        assert!(!coalescer.watch_set().contains(&sub));
    }

    #[tokio::test]
    async fn test_event_on_watched_directory_skips_rewalk() {
        let root = site_dir();
        let (mut coalescer, _rx) = coalescer(root.path(), "");
        let late = root.path().join("late");
        fs::create_dir(&late).expect("test setup failed");

        // An attribute change on the root must not rescan the tree
        coalescer.handle_event(changed(root.path().to_path_buf())).await;
        assert!(!coalescer.watch_set().contains(&late));

        coalescer.handle_event(changed(late.clone())).await;
        assert!(coalescer.watch_set().contains(&late));
        assert!(coalescer.flush().is_none());
    }

    #[tokio::test]
    async fn test_relative_root_drops_deleted_directory() {
        let root = tempfile::Builder::new()
            .prefix("site")
            .tempdir_in(".")
            .expect("test setup failed");
        let css = root.path().join("css");
        fs::create_dir(&css).expect("test setup failed");
        let (mut coalescer, _rx) = coalescer(root.path(), "");

        fs::remove_dir(&css).expect("test setup failed");
        let cwd = std::env::current_dir().expect("test setup failed");
        coalescer
            .handle_event(removed(cwd.join(root.path()).join("./css")))
            .await;

        assert!(!coalescer.watch_set().contains(&css));
        assert_eq!(coalescer.watch_set().len(), 1);
    }

    #[tokio::test]
    async fn test_ignored_directory_is_not_watched() {
        let root = site_dir();
        let (mut coalescer, _rx) = coalescer(root.path(), "node_modules");
        let deps = root.path().join("node_modules");

        fs::create_dir(&deps).expect("test setup failed");
        coalescer.handle_event(changed(deps.clone())).await;

        assert!(!coalescer.watch_set().contains(&deps));
    }

    #[tokio::test]
    async fn test_run_emits_one_tick_per_busy_window() {
        let root = site_dir();
        let file = root.path().join("index.html");
        fs::write(&file, "").expect("test setup failed");
        let (coalescer, mut ticks) = coalescer(root.path(), "");
        let (event_tx, event_rx) = mpsc::channel(16);
        let task = tokio::spawn(coalescer.run(event_rx));

        for _ in 0..5 {
            event_tx
                .send(changed(file.clone()))
                .await
                .expect("test setup failed");
        }

        let tick = timeout(Duration::from_secs(2), ticks.recv())
            .await
            .expect("timed out waiting for tick")
            .expect("tick channel closed");
        assert_eq!(tick.paths, vec![file.clone()]);

        // The burst may straddle one window boundary, never more
        if let Ok(Some(extra)) = timeout(Duration::from_millis(150), ticks.recv()).await {
            assert_eq!(extra.paths, vec![file]);
        }

        // Quiet windows produce nothing
        assert!(timeout(Duration::from_millis(350), ticks.recv())
            .await
            .is_err());

        drop(event_tx);
        timeout(Duration::from_secs(2), task)
            .await
            .expect("coalescer did not stop")
            .expect("coalescer panicked");
    }

    #[tokio::test]
    async fn test_run_flushes_on_shutdown() {
        let root = site_dir();
        let (coalescer, mut ticks) = coalescer(root.path(), "");
        let coalescer = EventCoalescer {
            window: Duration::from_secs(3600),
            ..coalescer
        };
        let (event_tx, event_rx) = mpsc::channel(4);
        let task = tokio::spawn(coalescer.run(event_rx));

        event_tx
            .send(removed(root.path().join("old.html")))
            .await
            .expect("test setup failed");
        drop(event_tx);

        task.await.expect("coalescer panicked");
        let tick = ticks.recv().await.expect("expected final tick");
        assert_eq!(tick.paths, vec![root.path().join("old.html")]);
    }

    #[tokio::test]
    async fn test_run_stops_when_consumer_is_gone() {
        let root = site_dir();
        let (coalescer, ticks) = coalescer(root.path(), "");
        drop(ticks);
        let (event_tx, event_rx) = mpsc::channel(4);
        let task = tokio::spawn(coalescer.run(event_rx));

        event_tx
            .send(removed(root.path().join("old.html")))
            .await
            .expect("test setup failed");

        timeout(Duration::from_secs(2), task)
            .await
            .expect("coalescer did not stop")
            .expect("coalescer panicked");
    }
}
