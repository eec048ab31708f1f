//! Library interface for the reloadwatch CLI
//!
//! Flag parsing and configuration resolution live here so they can be
//! exercised by integration tests; main.rs only wires them together.

use anyhow::{Context, Result};
use clap::Parser;
use reloadwatch_core::config::Config;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "reloadwatch")]
#[command(about = "Serve a directory and reload connected browsers when it changes")]
#[command(version)]
pub struct Cli {
    /// Which port to listen on [default: 8000]
    #[arg(long)]
    pub port: Option<u16>,

    /// Watched root directory, also the HTTP file server's root [default: .]
    #[arg(long, alias = "rootDir", value_name = "DIR")]
    pub root_dir: Option<PathBuf>,

    /// Ignored file patterns (regular expressions), separated by ','
    #[arg(long, value_name = "PATTERNS")]
    pub ignores: Option<String>,

    /// Only listen on the loopback interface
    #[arg(long)]
    pub private: bool,

    /// Delay in seconds before the browser reloads
    #[arg(long, value_name = "SECONDS")]
    pub delay: Option<f64>,

    /// Length of the event coalescing window in milliseconds [default: 100]
    #[arg(long, value_name = "MS")]
    pub window_ms: Option<u64>,

    /// Configuration file path [default: ./reloadwatch.toml if present]
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply the flags that were given on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(root_dir) = &self.root_dir {
            config.root_dir = root_dir.clone();
        }
        if let Some(ignores) = &self.ignores {
            config.ignores = ignores.clone();
        }
        if self.private {
            config.private = true;
        }
        if let Some(delay) = self.delay {
            config.delay = delay;
        }
        if let Some(window_ms) = self.window_ms {
            config.window_ms = window_ms;
        }
    }
}

/// Load file and environment configuration, then apply command-line flags
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_layered(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Change into the root directory, returning the configuration relative to it
///
/// Watched paths and served files are resolved against the new working
/// directory from here on.
pub fn enter_root_dir(mut config: Config) -> Result<Config> {
    std::env::set_current_dir(&config.root_dir).with_context(|| {
        format!(
            "Error changing to root dir '{}'",
            config.root_dir.display()
        )
    })?;
    info!("Serving {}", config.root_dir.display());
    config.root_dir = PathBuf::from(".");
    Ok(config)
}
