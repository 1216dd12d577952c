//! Spawning and supervising child processes, and checking on processes
//! started elsewhere.

use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

/// A command line for the build executor or a test program.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Spawn with stdin closed, stdout piped and stderr inherited.
    ///
    /// The raw spawn error is returned so callers can classify it.
    pub fn spawn_piped(&self) -> io::Result<Child> {
        self.command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
    }

    /// Run to completion with inherited stdio.
    pub fn status(&self) -> Result<ExitStatus> {
        self.command()
            .status()
            .with_context(|| format!("failed to execute `{}`", self.display_command()))
    }

    /// `program arg...`, for messages.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a supervised child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished {
    /// Exit code as reported by [`exit_code`].
    pub code: i32,
    /// The child was terminated because it ran past its deadline.
    pub timed_out: bool,
}

/// Stream a child's stdout and wait for it to exit.
///
/// Each stdout line (without its line terminator) is handed to `on_line` from
/// a reader thread. The exit status is awaited on a second thread and
/// delivered over a channel; with a `deadline`, the channel receive times out,
/// the child is terminated, and its final status is still collected.
pub fn supervise<F>(mut child: Child, deadline: Option<Duration>, on_line: F) -> io::Result<Finished>
where
    F: Fn(&str) + Sync,
{
    let pid = child.id();
    let stdout = child.stdout.take();
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        if let Some(stdout) = stdout {
            let on_line = &on_line;
            scope.spawn(move || {
                let mut reader = BufReader::new(stdout);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => break,
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buf);
                            on_line(line.trim_end_matches(['\n', '\r']));
                        }
                        Err(e) => {
                            tracing::debug!(pid, "stopped reading child output: {}", e);
                            break;
                        }
                    }
                }
            });
        }

        scope.spawn(move || {
            let _ = tx.send(child.wait());
        });

        let disconnected = || io::Error::other("process waiter exited without a status");

        let (status, timed_out) = match deadline {
            None => (rx.recv().map_err(|_| disconnected())?, false),
            Some(limit) => match rx.recv_timeout(limit) {
                Ok(status) => (status, false),
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!(pid, "deadline of {:?} reached, terminating", limit);
                    terminate(pid);
                    (rx.recv().map_err(|_| disconnected())?, true)
                }
                Err(RecvTimeoutError::Disconnected) => return Err(disconnected()),
            },
        };

        let status = status?;
        Ok(Finished {
            code: exit_code(status),
            timed_out,
        })
    })
}

/// Exit code of a finished process.
///
/// On Unix a process killed by a signal reports `128 + signal`, like a shell
/// would. Anything else without a code maps to `-1`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

/// Whether `pid` names a live process on this host. Zombies count as dead.
pub fn is_running(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system
        .process(pid)
        .is_some_and(|process| process.status() != ProcessStatus::Zombie)
}

/// Kill `pid` and every process descended from it.
///
/// The tree is collected before anything is killed, since orphans are
/// reparented and lose their link to `pid`. Returns how many processes were
/// signalled.
pub fn terminate(pid: u32) -> usize {
    let root = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut tree = vec![root];
    let mut next = 0;
    while let Some(&parent) = tree.get(next) {
        let children: Vec<Pid> = system
            .processes()
            .iter()
            .filter(|&(child, process)| process.parent() == Some(parent) && !tree.contains(child))
            .map(|(&child, _)| child)
            .collect();
        tree.extend(children);
        next += 1;
    }

    tree.iter()
        .filter_map(|pid| system.process(*pid))
        .filter(|process| process.kill())
        .count()
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find ninja.
pub fn find_ninja() -> Option<PathBuf> {
    find_executable("ninja")
}
