//! Waiting on a build owned by another process.
//!
//! The owner is not our child, so there is no handle to wait on. All we have
//! is the pid from the registry, which is polled against the process table.

use std::thread;
use std::time::Duration;

use crate::util::process::is_running;

/// Default interval between liveness checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Shortest interval between liveness checks; shorter requests are raised.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How waiting on an owner ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerWait {
    /// The pid was not a live process when first checked.
    AlreadyGone,
    /// The owner was observed running and has since exited.
    Finished,
}

/// Block until `pid` is no longer a live process.
pub fn wait_for_owner(pid: u32, poll_interval: Duration) -> OwnerWait {
    let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
    if !is_running(pid) {
        return OwnerWait::AlreadyGone;
    }

    while is_running(pid) {
        thread::sleep(poll_interval);
    }
    OwnerWait::Finished
}
