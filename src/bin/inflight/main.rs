//! inflight CLI - coordinated ninja builds

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use inflight::util::Shell;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    // Parse CLI
    let cli = Cli::parse_from(cli::normalize_args(std::env::args_os()));

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("inflight=debug")
    } else {
        EnvFilter::new("inflight=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color);

    // Execute command
    match cli.command {
        Some(Commands::Status(args)) => commands::status::execute(args),
        Some(Commands::Run(args)) => commands::run::execute(args, &shell),
        None => commands::build::execute(cli.build, &shell),
    }
}
