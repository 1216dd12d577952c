//! Coordinated build of one build file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::coord::{Coordinator, LaunchOutcome, Launcher, Registry};
use crate::util::process::{exit_code, ProcessBuilder};
use crate::util::shell::{Shell, Status};

/// Options for a coordinated build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Build executor (ninja or compatible)
    pub exe: PathBuf,
    /// Build file passed with `-f`; also the registry key
    pub file: String,
    /// Target to build
    pub target: Option<String>,
    /// Run `<exe> -f <file> -t clean` first
    pub clean: bool,
    /// Wall-clock limit for the build
    pub timeout: Option<Duration>,
    /// Interval for polling a build owned by another process
    pub poll_interval: Duration,
}

/// Build `opts.file`, waiting for any build of it already in flight.
///
/// A failed build is reported through the outcome's exit code; only protocol
/// failures (bad target, executor not startable, registry I/O) are errors.
pub fn build(registry: &Registry, shell: &Shell, opts: &BuildOptions) -> Result<LaunchOutcome> {
    let target = opts.target.as_deref().unwrap_or_default();

    shell.task(format!("building {} {}", opts.file, target), |task| -> Result<LaunchOutcome> {
        if opts.clean {
            clean(shell, opts);
        }

        let launcher = Launcher::new(&opts.exe, registry, shell).with_timeout(opts.timeout);
        let coordinator = Coordinator::new(launcher, shell).with_poll_interval(opts.poll_interval);

        let outcome = coordinator.run(&opts.file, opts.target.as_deref())?;
        if !outcome.success() {
            task.fail();
        }
        Ok(outcome)
    })
}

/// Clean the build file's outputs. Failures only warn: the build that
/// follows reports the real state.
fn clean(shell: &Shell, opts: &BuildOptions) {
    let cmd = ProcessBuilder::new(&opts.exe).args(["-f", opts.file.as_str(), "-t", "clean"]);
    shell.status(Status::Cleaning, &opts.file);
    tracing::debug!(command = %cmd.display_command(), "cleaning");

    match cmd.status() {
        Ok(status) if status.success() => {}
        Ok(status) => shell.warn(format!(
            "`{}` exited with code {}",
            cmd.display_command(),
            exit_code(status)
        )),
        Err(e) => shell.warn(format!("{:#}", e)),
    }
}
