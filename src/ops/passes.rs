//! Running test programs and aggregating pass results.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::util::process::{supervise, ProcessBuilder};
use crate::util::shell::{Shell, Status};

/// Ordered results of named passes.
///
/// The aggregate code is the bitwise OR of every recorded code, so any
/// failing pass makes the whole run fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassResults {
    results: Vec<(String, i32)>,
}

impl PassResults {
    /// Create an empty result set.
    pub fn new() -> Self {
        PassResults::default()
    }

    /// Record the result of a pass. A pass recorded twice keeps its latest code.
    pub fn record(&mut self, name: impl Into<String>, code: i32) {
        let name = name.into();
        match self.results.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = code,
            None => self.results.push((name, code)),
        }
    }

    /// Code recorded for `name`.
    pub fn get(&self, name: &str) -> Option<i32> {
        self.results
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, code)| *code)
    }

    /// All results in recording order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.results.iter().map(|(n, code)| (n.as_str(), *code))
    }

    /// Names of the passes that failed.
    pub fn failed(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, code)| *code != 0)
            .map(|(name, _)| name)
            .collect()
    }

    /// Aggregate exit code.
    pub fn exit_code(&self) -> i32 {
        self.results.iter().fold(0, |acc, (_, code)| acc | code)
    }

    /// Print one line per pass and a summary.
    pub fn report(&self, shell: &Shell) {
        for (name, code) in self.iter() {
            if code == 0 {
                shell.status(Status::Finished, format!("{} - success", name));
            } else {
                shell.error(format!("{} - failed (code {})", name, code));
            }
        }

        let failed = self.failed();
        if failed.is_empty() {
            shell.status(
                Status::Finished,
                format!("all {} pass(es) succeeded", self.results.len()),
            );
        } else {
            shell.error(format!(
                "{} of {} pass(es) failed",
                failed.len(),
                self.results.len()
            ));
        }
    }
}

/// Run test programs one after another.
///
/// A program that runs past `timeout` is terminated and only warned about;
/// any other non-zero exit fails the pass. Returns the OR of the failing
/// codes. Programs that cannot be started are errors.
pub fn run_programs(programs: &[PathBuf], timeout: Option<Duration>, shell: &Shell) -> Result<i32> {
    let mut rc = 0;

    for program in programs {
        shell.status(Status::Running, display_name(program));

        let child = ProcessBuilder::new(program)
            .spawn_piped()
            .with_context(|| format!("failed to spawn `{}`", program.display()))?;
        let pid = child.id();

        let finished = supervise(child, timeout, |line| shell.build_line(pid, line))
            .with_context(|| format!("failed to wait for `{}`", program.display()))?;

        if finished.timed_out {
            shell.warn(format!(
                "timeout triggered for {} after {:?}",
                program.display(),
                timeout.unwrap_or_default()
            ));
        } else if finished.code != 0 {
            shell.error(format!(
                "{} failed with exit code {}",
                program.display(),
                finished.code
            ));
            rc |= finished.code;
        }
    }

    Ok(rc)
}

fn display_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}
