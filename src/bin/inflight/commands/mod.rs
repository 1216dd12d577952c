//! Command implementations

pub mod build;
pub mod run;
pub mod status;

use std::path::PathBuf;

use anyhow::Result;

use inflight::util::GlobalContext;

/// Registry given on the command line, or the one of the enclosing build tree.
pub fn registry_path(ctx: &GlobalContext, flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => ctx.registry_path(),
    }
}
