//! Centralized shell output.
//!
//! Everything meant for the person at the terminal goes through [`Shell`]:
//! status lines, relayed build output and timed tasks. Internal diagnostics
//! use `tracing` instead.

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::time::{Duration, Instant};

/// How much the shell prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    #[default]
    Normal,
    /// Normal output plus debug logging.
    Verbose,
}

/// When to emit ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Color when stderr is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            ("auto", ColorChoice::Auto),
            ("always", ColorChoice::Always),
            ("never", ColorChoice::Never),
        ]
        .into_iter()
        .find(|(name, _)| s.eq_ignore_ascii_case(name))
        .map(|(_, choice)| choice)
        .ok_or_else(|| format!("unknown color mode `{}` (use auto, always or never)", s))
    }
}

/// Width of the right-aligned status column.
const STATUS_WIDTH: usize = 12;

/// Label printed in front of a shell message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Finished,
    Building,
    Cleaning,
    Running,
    Waiting,
    Info,
    Warning,
    Error,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Finished => "Finished",
            Status::Building => "Building",
            Status::Cleaning => "Cleaning",
            Status::Running => "Running",
            Status::Waiting => "Waiting",
            Status::Info => "Info",
            Status::Warning => "Warning",
            Status::Error => "error",
        }
    }

    /// Bold ANSI color: green when done, cyan while working, yellow and red
    /// for problems.
    fn ansi(self) -> &'static str {
        match self {
            Status::Finished => "\x1b[1;32m",
            Status::Building | Status::Cleaning | Status::Running | Status::Waiting => {
                "\x1b[1;36m"
            }
            Status::Info => "\x1b[1;34m",
            Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
        }
    }
}

/// Severity of a line printed by a build executor or test program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Error,
    Warning,
    Plain,
}

const ERROR_KEYWORDS: &[&str] = &["failed", "error"];
const WARNING_KEYWORDS: &[&str] = &["warning"];

impl LineKind {
    /// Classify a line by case-insensitive keyword search.
    pub fn classify(line: &str) -> LineKind {
        let lower = line.to_lowercase();
        if ERROR_KEYWORDS.iter().any(|k| lower.contains(k)) {
            LineKind::Error
        } else if WARNING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            LineKind::Warning
        } else {
            LineKind::Plain
        }
    }
}

/// User-facing output sink.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
}

impl Shell {
    /// Create a new shell.
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };

        Shell {
            verbosity,
            use_color,
        }
    }

    /// Create a shell from CLI flags. Quiet wins over verbose.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice) -> Self {
        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        Shell::new(verbosity, color)
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Print `msg` to stderr behind a status label. Quiet shells only
    /// print errors.
    pub fn status(&self, status: Status, msg: impl Display) {
        if !self.is_quiet() || status == Status::Error {
            eprintln!("{} {}", self.format_status(status), msg);
        }
    }

    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    pub fn error(&self, msg: impl Display) {
        self.status(Status::Error, msg);
    }

    /// Print a line without a status prefix.
    pub fn plain(&self, msg: impl Display) {
        if !self.is_quiet() {
            eprintln!("{}", msg);
        }
    }

    /// Relay one line of output from the process `pid`.
    pub fn build_line(&self, pid: u32, line: &str) {
        let text = format!("[pid:{}] {}", pid, line);
        match LineKind::classify(line) {
            LineKind::Error => self.error(text),
            LineKind::Warning => self.warn(text),
            LineKind::Plain => self.plain(text),
        }
    }

    /// Run `work` as a named, timed task.
    ///
    /// Prints `msg` before running, then `msg - done` or `msg - failed` with
    /// the elapsed time once `work` returns, whether it returned `Ok` or
    /// `Err`. `work` may also flag the task as failed through [`Task::fail`].
    pub fn task<T, E>(
        &self,
        msg: impl Display,
        work: impl FnOnce(&mut Task) -> Result<T, E>,
    ) -> Result<T, E> {
        let msg = msg.to_string();
        self.note(&msg);

        let mut task = Task {
            failed: false,
            start: Instant::now(),
        };
        let result = work(&mut task);
        let failed = task.failed || result.is_err();

        let outcome = if failed { "failed" } else { "done" };
        let line = format!("{} - {}", msg, outcome);
        if failed {
            self.error(line);
        } else {
            self.status(Status::Finished, line);
        }
        self.note(format!("took {}", format_duration(task.elapsed())));

        result
    }

    /// Right-aligned status label, colored when enabled.
    fn format_status(&self, status: Status) -> String {
        let label = format!("{:>width$}", status.label(), width = STATUS_WIDTH);
        if self.use_color {
            format!("{}{}\x1b[0m", status.ansi(), label)
        } else {
            label
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::default(), ColorChoice::default())
    }
}

/// Handle given to the body of [`Shell::task`].
#[derive(Debug)]
pub struct Task {
    failed: bool,
    start: Instant,
}

impl Task {
    /// Report the task as failed even if its body returns `Ok`.
    pub fn fail(&mut self) {
        self.failed = true;
    }

    /// Whether the task has been flagged as failed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Time since the task started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// `0.50s` below a minute, `1.5m` above.
fn format_duration(duration: Duration) -> String {
    match duration.as_secs_f64() {
        secs if secs < 60.0 => format!("{:.2}s", secs),
        secs => format!("{:.1}m", secs / 60.0),
    }
}
