//! `inflight run` command

use std::time::Duration;

use anyhow::Result;

use crate::cli::RunArgs;
use inflight::ops::{run_programs, PassResults};
use inflight::util::Shell;

pub fn execute(args: RunArgs, shell: &Shell) -> Result<i32> {
    let timeout = args.timeout.map(Duration::from_secs);
    let mut results = PassResults::new();

    for program in &args.programs {
        let code = run_programs(std::slice::from_ref(program), timeout, shell)?;
        results.record(program.display().to_string(), code);
    }

    results.report(shell);
    Ok(results.exit_code())
}
