//! Configuration loading from files and environment variables

use crate::error::{Error, Result, ResultExt};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;
use tracing::debug;

use super::defaults::*;
use super::Config;

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from an optional TOML file with environment overrides
    ///
    /// When `path` is `None`, `reloadwatch.toml` in the current directory is
    /// used if it exists. A path that was given explicitly must exist.
    ///
    /// Environment variables are prefixed with `RELOADWATCH_`, for example
    /// `RELOADWATCH_PORT=9000` or `RELOADWATCH_IGNORES='\.log$'`.
    pub fn load_layered(path: Option<&Path>) -> Result<Self> {
        let builder = ConfigLib::builder();

        // config crate doesn't apply serde defaults for missing keys
        let builder = set_config_default(builder, "port", i64::from(DEFAULT_PORT))?;
        let builder = set_config_default(builder, "root_dir", DEFAULT_ROOT_DIR)?;
        let builder = set_config_default(builder, "ignores", "")?;
        let builder = set_config_default(builder, "private", false)?;
        let builder = set_config_default(builder, "delay", 0.0)?;
        let builder = set_config_default(builder, "window_ms", DEFAULT_WINDOW_MS as i64)?;
        let mut builder =
            set_config_default(builder, "max_queue_size", DEFAULT_MAX_QUEUE_SIZE as i64)?;

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(File::from(path));
            }
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    debug!("Loading configuration from {}", local.display());
                    builder = builder.add_source(File::from(local));
                }
            }
        }

        builder = builder.add_source(Environment::with_prefix("RELOADWATCH").try_parsing(true));

        let settings = builder.build().context("Failed to build configuration")?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
