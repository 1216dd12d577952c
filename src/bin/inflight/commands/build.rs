//! Default command: coordinated build

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::BuildArgs;
use inflight::coord::Registry;
use inflight::ops::{build, BuildOptions};
use inflight::util::config::Config;
use inflight::util::process::find_ninja;
use inflight::util::{GlobalContext, Shell};

pub fn execute(args: BuildArgs, shell: &Shell) -> Result<i32> {
    let ctx = GlobalContext::new()?;
    let config = ctx.load_config();

    let file = args
        .file
        .context("no build file given; pass -file <FILE> (see --help)")?;
    let registry = Registry::new(super::registry_path(&ctx, args.registry)?);

    let opts = BuildOptions {
        exe: resolve_exe(args.exe, &config),
        file,
        target: args.target,
        clean: args.clean,
        timeout: args
            .timeout
            .map(Duration::from_secs)
            .or_else(|| config.timeout()),
        poll_interval: config.poll_interval(),
    };
    tracing::debug!(registry = %registry.path().display(), exe = %opts.exe.display(), "resolved build");

    let outcome = build(&registry, shell, &opts)?;
    Ok(outcome.code)
}

/// `-exe`, then the configured executor, then ninja from PATH.
fn resolve_exe(flag: Option<PathBuf>, config: &Config) -> PathBuf {
    flag.or_else(|| config.launcher.exe.clone())
        .or_else(find_ninja)
        .unwrap_or_else(|| PathBuf::from("ninja"))
}
