//! Configuration module for reloadwatch
//!
//! The startup options can come from a TOML file, from `RELOADWATCH_*`
//! environment variables, and finally from command-line flags applied by the
//! binary on top of the loaded value.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub use defaults::{DEFAULT_CONFIG_FILE, DEFAULT_PORT, DEFAULT_WINDOW_MS};

use defaults::*;

/// Startup configuration for the live-reload server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Listen port for HTTP and the push channel
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root of the watched tree and of the static file server
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Comma-separated list of ignore patterns (regular expressions)
    #[serde(default)]
    pub ignores: String,

    /// Bind to the loopback interface only
    #[serde(default)]
    pub private: bool,

    /// Seconds the browser waits before it reloads
    #[serde(default)]
    pub delay: f64,

    /// Length of one coalescing window in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Capacity of the raw filesystem event queue
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            root_dir: default_root_dir(),
            ignores: String::new(),
            private: false,
            delay: 0.0,
            window_ms: default_window_ms(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

impl Config {
    /// Parses a configuration from a TOML string, without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Checks that every option holds a usable value
    pub fn validate(&self) -> Result<()> {
        if !self.delay.is_finite() || self.delay < 0.0 {
            return Err(Error::config(format!(
                "delay must be a non-negative number of seconds, got {}",
                self.delay
            )));
        }
        if self.window_ms == 0 {
            return Err(Error::config("window_ms must be greater than zero"));
        }
        if self.max_queue_size == 0 {
            return Err(Error::config("max_queue_size must be greater than zero"));
        }
        Ok(())
    }

    /// The non-empty entries of the comma-separated ignore list
    pub fn ignore_patterns(&self) -> Vec<String> {
        self.ignores
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    }

    /// Address the HTTP listener binds to
    pub fn bind_addr(&self) -> SocketAddr {
        let ip = if self.private {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };
        SocketAddr::new(ip, self.port)
    }
}
