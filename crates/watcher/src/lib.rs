#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! File system watching for browser live reload
//!
//! This crate turns the raw notification stream of a directory tree into a
//! low-frequency "something changed" signal:
//! - Regex and hidden/temp-file ignore rules
//! - A watch set that follows directories as they appear and disappear
//! - Window-based coalescing with per-path deduplication
//!
//! # Example
//!
//! ```no_run
//! use reloadwatch_watcher::{FileWatcher, WatcherConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WatcherConfig::builder()
//!     .ignore_patterns(vec![r"\.log$".to_string()])
//!     .build();
//! let watcher = FileWatcher::new(config);
//!
//! let (mut ticks, _task) = watcher.spawn(".")?;
//! while let Some(tick) = ticks.recv().await {
//!     println!("{} path(s) changed", tick.paths.len());
//! }
//! # Ok(())
//! # }
//! ```

// Private implementation modules
mod coalescer;
mod config;
mod events;
mod ignore;
mod watch_set;
mod watcher;

// Public exports - minimal API surface
pub use coalescer::{EventCoalescer, PendingEventBuffer};
pub use config::WatcherConfig;
pub use events::{ChangeEvent, ChangeKind, ReloadTick};
pub use ignore::IgnoreMatcher;
pub use watch_set::{WatchBackend, WatchSet};
pub use watcher::FileWatcher;
