//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

use std::env;
use std::path::PathBuf;

use ytgrab_core::{CoreError, CoreResult};

pub mod download;
pub mod resolve;

/// Uses the explicitly given path, else finds `name` on PATH.
pub(crate) fn locate_tool(given: Option<PathBuf>, name: &str) -> CoreResult<PathBuf> {
    if let Some(path) = given {
        return Ok(path);
    }
    which::which(name)
        .map_err(|e| CoreError::Config(format!("{name} not found on PATH: {e}")))
}

/// Platform home Downloads directory, the original default target.
pub(crate) fn default_download_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Downloads"))
}
