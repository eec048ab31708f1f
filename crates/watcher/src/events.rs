//! Change event types
//!
//! Raw notifications from the operating system are collapsed into two kinds:
//! a path went away, or a path changed in some other way.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event as NotifyEvent, EventKind};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What happened to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The path was deleted or renamed away
    Removed,
    /// The path was created, written, renamed into place or had its metadata changed
    Changed,
}

/// One filesystem notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    path: PathBuf,
    kind: ChangeKind,
    received_at: Instant,
}

impl ChangeEvent {
    /// Create a new event, stamped with the current time
    ///
    /// Returns `None` for an empty path.
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Option<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return None;
        }
        Some(Self {
            path,
            kind,
            received_at: Instant::now(),
        })
    }

    /// Shorthand for a `Changed` event
    pub fn changed(path: impl Into<PathBuf>) -> Option<Self> {
        Self::new(path, ChangeKind::Changed)
    }

    /// Shorthand for a `Removed` event
    pub fn removed(path: impl Into<PathBuf>) -> Option<Self> {
        Self::new(path, ChangeKind::Removed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// Convert one notify event into change events, one per affected path
    ///
    /// Access notifications carry no change and produce nothing.
    pub fn from_notify(event: NotifyEvent) -> Vec<Self> {
        match event.kind {
            EventKind::Access(_) | EventKind::Other => Vec::new(),
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
                .paths
                .into_iter()
                .filter_map(Self::removed)
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                // paths are [from, to]
                let mut paths = event.paths.into_iter();
                let from = paths.next().and_then(Self::removed);
                let to = paths.filter_map(Self::changed);
                from.into_iter().chain(to).collect()
            }
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any => event
                .paths
                .into_iter()
                .filter_map(Self::changed)
                .collect(),
        }
    }
}

/// Output of one coalescing window that saw at least one qualifying change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadTick {
    /// Distinct changed paths, sorted
    pub paths: Vec<PathBuf>,
}
