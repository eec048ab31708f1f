//! Core types for the reloadwatch live-reload server
//!
//! This crate provides the foundational pieces shared by the watcher,
//! the server and the command-line binary:
//!
//! - **Configuration**: layered loading of the startup options
//! - **Error handling**: unified error types
//!

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::Config;
pub use error::{Error, Result, ResultExt};
