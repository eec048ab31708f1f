//! The set of directories under observation
//!
//! Files are never watched directly. Every non-ignored directory of the tree
//! gets its own non-recursive watch, so the set can follow directories as
//! they are created and deleted at runtime.

use crate::ignore::IgnoreMatcher;
use notify::{RecursiveMode, Watcher as NotifyWatcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Something that can start and stop watching a single directory
pub trait WatchBackend: Send {
    /// Start watching `path` (non-recursively)
    fn watch_dir(&mut self, path: &Path) -> notify::Result<()>;

    /// Stop watching `path`
    fn unwatch_dir(&mut self, path: &Path) -> notify::Result<()>;
}

impl<W: NotifyWatcher + Send> WatchBackend for W {
    fn watch_dir(&mut self, path: &Path) -> notify::Result<()> {
        self.watch(path, RecursiveMode::NonRecursive)
    }

    fn unwatch_dir(&mut self, path: &Path) -> notify::Result<()> {
        self.unwatch(path)
    }
}

/// Directories currently watched, together with the backend watching them
pub struct WatchSet<B> {
    backend: B,
    matcher: Arc<IgnoreMatcher>,
    dirs: BTreeSet<PathBuf>,
}

impl<B: WatchBackend> WatchSet<B> {
    /// Walk `root` and watch every directory that is not ignored
    ///
    /// Ignored directories are skipped together with their whole subtree.
    /// The root itself is always watched. Entries that cannot be read are
    /// logged and skipped.
    pub fn initialize(root: &Path, matcher: Arc<IgnoreMatcher>, backend: B) -> Self {
        let mut set = Self {
            backend,
            matcher,
            dirs: BTreeSet::new(),
        };
        let root = watch_key(root);
        let added = set.add_tree(&root, true);
        info!("Watching {} director(ies) under {}", added, root.display());
        set
    }

    /// Watch a directory discovered at runtime, along with everything below it
    ///
    /// Returns the number of directories newly added.
    pub fn add(&mut self, path: &Path) -> usize {
        self.add_tree(&watch_key(path), false)
    }

    /// Forget a directory and every watched directory below it
    ///
    /// Returns `false` when the path was not watched. Unwatch failures are
    /// only logged: the OS usually drops the watch itself once the directory
    /// is gone.
    pub fn remove(&mut self, path: &Path) -> bool {
        let path = watch_key(path);
        let doomed: Vec<PathBuf> = self
            .dirs
            .iter()
            .filter(|dir| dir.starts_with(&path))
            .cloned()
            .collect();

        if doomed.is_empty() {
            return false;
        }

        for dir in doomed {
            if let Err(e) = self.backend.unwatch_dir(&dir) {
                debug!("Failed to unwatch {}: {}", dir.display(), e);
            }
            self.dirs.remove(&dir);
            info!("Stopped monitoring dir {}", dir.display());
        }
        true
    }

    /// Check if a directory is in the set
    pub fn contains(&self, path: &Path) -> bool {
        self.dirs.contains(&watch_key(path))
    }

    /// Number of watched directories
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Watched directories in sorted order, as absolute paths
    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    /// The backend doing the actual watching
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn add_tree(&mut self, root: &Path, is_root: bool) -> usize {
        let matcher = Arc::clone(&self.matcher);
        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            let exempt = is_root && entry.depth() == 0;
            if entry.file_type().is_dir() && !exempt && matcher.should_ignore(entry.path()) {
                debug!("Ignore dir {}", entry.path().display());
                return false;
            }
            true
        });

        let mut added = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let dir = normalize(entry.path());
            if self.dirs.contains(&dir) {
                continue;
            }
            match self.backend.watch_dir(&dir) {
                Ok(()) => {
                    debug!("Monitoring dir {}", dir.display());
                    self.dirs.insert(dir);
                    added += 1;
                }
                Err(e) => warn!("Failed to watch {}: {}", dir.display(), e),
            }
        }
        added
    }
}

/// Collapse repeated separators and trailing slashes so equal paths compare equal
pub(crate) fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

/// Absolute form of `path`, matching how notify reports event paths
///
/// notify joins relative watch paths onto the working directory, so `.`
/// produces events like `/srv/site/./css`. Keys are made absolute and
/// stripped of `.` components so both spellings land on the same entry.
fn watch_key(path: &Path) -> PathBuf {
    match std::path::absolute(path) {
        Ok(absolute) => normalize(&absolute),
        Err(_) => normalize(path),
    }
}
