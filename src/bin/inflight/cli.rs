//! CLI definitions using clap.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use inflight::util::shell::ColorChoice;

/// Flags historically spelled with a single dash (`-exe`, `-file`, `-build`).
const LEGACY_FLAGS: &[&str] = &["exe", "file", "build"];

/// inflight - run one build per build file at a time
#[derive(Parser, Debug)]
#[command(name = "inflight")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    #[command(flatten)]
    pub build: BuildArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List builds currently in flight
    Status(StatusArgs),

    /// Run test programs and report pass results
    Run(RunArgs),
}

/// Arguments of the default coordinated build.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Build executor (defaults to config, then ninja on PATH)
    #[arg(long, value_name = "PATH")]
    pub exe: Option<PathBuf>,

    /// Build file passed to the executor with -f
    #[arg(long, value_name = "FILE")]
    pub file: Option<String>,

    /// Target to build
    #[arg(long = "build", value_name = "TARGET")]
    pub target: Option<String>,

    /// Clean the build file's outputs first
    #[arg(long)]
    pub clean: bool,

    /// Terminate the build after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Registry file (defaults to the one of the enclosing build tree)
    #[arg(long, value_name = "PATH")]
    pub registry: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Registry file (defaults to the one of the enclosing build tree)
    #[arg(long, value_name = "PATH")]
    pub registry: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Terminate a program after this many seconds; this only warns
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Programs to run
    #[arg(required = true)]
    pub programs: Vec<PathBuf>,
}

/// Rewrite `-exe`, `-file` and `-build` (and their `=value` forms) to the
/// double-dash spelling clap understands. Arguments after `--` are untouched.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut past_terminator = false;

    args.into_iter()
        .map(|arg| {
            if past_terminator {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                past_terminator = true;
                return arg;
            }
            match text.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') && is_legacy_flag(rest) => {
                    OsString::from(format!("--{}", rest))
                }
                _ => arg,
            }
        })
        .collect()
}

fn is_legacy_flag(flag: &str) -> bool {
    let name = flag.split_once('=').map_or(flag, |(name, _)| name);
    LEGACY_FLAGS.contains(&name)
}
