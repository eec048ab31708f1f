//! Default values and functions for configuration

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_WINDOW_MS: u64 = 100;
pub const DEFAULT_CONFIG_FILE: &str = "reloadwatch.toml";
pub(crate) const DEFAULT_ROOT_DIR: &str = ".";
pub(crate) const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;

pub(crate) fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) fn default_root_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT_DIR)
}

pub(crate) fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

pub(crate) fn default_max_queue_size() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}
