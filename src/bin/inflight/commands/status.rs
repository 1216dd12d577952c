//! `inflight status` command

use anyhow::Result;

use crate::cli::StatusArgs;
use inflight::coord::Registry;
use inflight::util::process::is_running;
use inflight::util::GlobalContext;

pub fn execute(args: StatusArgs) -> Result<i32> {
    let ctx = GlobalContext::new()?;
    let registry = Registry::new(super::registry_path(&ctx, args.registry)?);

    let entries = registry.entries()?;
    if entries.is_empty() {
        println!("no builds in flight");
        return Ok(0);
    }

    for entry in entries {
        let state = if is_running(entry.pid) {
            "running"
        } else {
            "stale"
        };
        println!("{} (PID: {}) {}", entry.unit, entry.pid, state);
    }

    Ok(0)
}
