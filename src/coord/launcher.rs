//! Starting a build and registering it as in flight.

use std::path::PathBuf;
use std::time::Duration;

use crate::util::process::{supervise, terminate, ProcessBuilder};
use crate::util::shell::{Shell, Status};

use super::error::{CoordError, CoordResult};
use super::registry::Registry;

/// Result of one build executor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// Pid of the build process.
    pub pid: u32,
    /// Its exit code.
    pub code: i32,
    /// Whether it was terminated for running past the deadline.
    pub timed_out: bool,
}

impl LaunchOutcome {
    /// Whether the build exited zero.
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs `<exe> -f <build file> <target>` with the build registered.
#[derive(Debug)]
pub struct Launcher<'a> {
    exe: PathBuf,
    registry: &'a Registry,
    shell: &'a Shell,
    timeout: Option<Duration>,
}

impl<'a> Launcher<'a> {
    /// Create a launcher for the build executor `exe`.
    pub fn new(exe: impl Into<PathBuf>, registry: &'a Registry, shell: &'a Shell) -> Self {
        Launcher {
            exe: exe.into(),
            registry,
            shell,
            timeout: None,
        }
    }

    /// Terminate builds that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The registry builds are recorded in.
    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Run one build and wait for it.
    ///
    /// The registry entry `(build_file, pid)` is appended right after the
    /// process starts and is left in place when this returns; removing it is
    /// the caller's job.
    pub fn launch(&self, build_file: &str, target: Option<&str>) -> CoordResult<LaunchOutcome> {
        if build_file.trim().is_empty() {
            return Err(CoordError::InvalidBuildFile);
        }
        let target = match target.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(CoordError::InvalidTarget),
        };

        let cmd = ProcessBuilder::new(&self.exe).args(["-f", build_file, target]);
        let mut child = cmd.spawn_piped().map_err(|source| CoordError::Spawn {
            program: self.exe.clone(),
            source,
        })?;
        let pid = child.id();

        if let Err(e) = self.registry.append(build_file, pid) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        tracing::debug!(command = %cmd.display_command(), pid, "launched build");
        self.shell.status(
            Status::Building,
            format!(
                "{} {} (exe: {}, pid: {})",
                build_file,
                target,
                self.exe.display(),
                pid
            ),
        );

        let finished = supervise(child, self.timeout, |line| self.shell.build_line(pid, line))
            .map_err(|source| {
                terminate(pid);
                CoordError::Wait { pid, source }
            })?;

        if finished.timed_out {
            self.shell.warn(format!(
                "build of {} (pid: {}) was terminated after {:?}",
                build_file,
                pid,
                self.timeout.unwrap_or_default()
            ));
        }

        Ok(LaunchOutcome {
            pid,
            code: finished.code,
            timed_out: finished.timed_out,
        })
    }
}
