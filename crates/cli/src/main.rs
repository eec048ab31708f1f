//! reloadwatch - serve a directory and live-reload browsers on change
//!
//! This binary provides the command-line interface for the server.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::Result;
use clap::Parser;
use reloadwatch::{enter_root_dir, resolve_config, Cli};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let config = enter_root_dir(config)?;
    reloadwatch_server::run_server(config).await?;
    Ok(())
}

/// Initialize logging system
///
/// `RUST_LOG` takes precedence over the `--verbose` flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "reloadwatch={level},reloadwatch_server={level},reloadwatch_watcher={level},reloadwatch_core={level},tower_http=warn"
        ))
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
