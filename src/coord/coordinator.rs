//! Deciding whether to build now or wait for a build already in flight.
//!
//! For a requested build unit the coordinator either launches a build
//! straight away, or, when another process is recorded as building the same
//! unit, waits for that process to exit and then launches a fresh build of
//! its own. Either way the caller gets the exit code of a build that started
//! after its request, never the code of someone else's earlier build.
//!
//! Known looseness: the lookup and the launcher's append are not one atomic
//! step. Two coordinators that both look up before either has appended will
//! both build.

use std::time::Duration;

use crate::util::shell::{Shell, Status};

use super::error::CoordResult;
use super::launcher::{LaunchOutcome, Launcher};
use super::error::CoordError;
use super::owner::{wait_for_owner, OwnerWait, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
use super::registry::Registry;

/// Single-build-in-flight coordinator for one registry.
#[derive(Debug)]
pub struct Coordinator<'a> {
    launcher: Launcher<'a>,
    shell: &'a Shell,
    poll_interval: Duration,
    /// Pause between the registry lookup and the launch.
    #[cfg(test)]
    launch_delay: Duration,
}

impl<'a> Coordinator<'a> {
    /// Create a coordinator that builds through `launcher`.
    pub fn new(launcher: Launcher<'a>, shell: &'a Shell) -> Self {
        Coordinator {
            launcher,
            shell,
            poll_interval: DEFAULT_POLL_INTERVAL,
            #[cfg(test)]
            launch_delay: Duration::ZERO,
        }
    }

    /// Set how often a foreign owner is checked for liveness. Intervals below
    /// [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    #[cfg(test)]
    fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    fn registry(&self) -> &Registry {
        self.launcher.registry()
    }

    /// Build `build_file`/`target`, waiting on any build of it in flight.
    ///
    /// An empty `build_file` is rejected up front: as a registry key it
    /// would match, and later remove, every unit's entry.
    pub fn run(&self, build_file: &str, target: Option<&str>) -> CoordResult<LaunchOutcome> {
        if build_file.trim().is_empty() {
            return Err(CoordError::InvalidBuildFile);
        }

        let owner = if self.registry().exists() {
            self.registry().lookup(build_file)?
        } else {
            None
        };

        #[cfg(test)]
        std::thread::sleep(self.launch_delay);

        match owner {
            None => self.launch_and_cleanup(build_file, target),
            Some(pid) => {
                self.shell.status(
                    Status::Waiting,
                    format!("for build of file {} to finish (PID: {})", build_file, pid),
                );
                if wait_for_owner(pid, self.poll_interval) == OwnerWait::AlreadyGone {
                    tracing::info!("build with pid({}) was already closed", pid);
                }
                self.registry().remove(build_file)?;

                // Picks up anything the previous build did not see; a no-op
                // build if nothing changed since.
                self.launch_and_cleanup(build_file, target)
            }
        }
    }

    /// Launch, then drop the unit's registry entry whatever the outcome.
    fn launch_and_cleanup(
        &self,
        build_file: &str,
        target: Option<&str>,
    ) -> CoordResult<LaunchOutcome> {
        let outcome = self.launcher.launch(build_file, target);
        let cleanup = self.registry().remove(build_file);

        let outcome = outcome?;
        cleanup?;
        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::FakeNinja;
    use crate::util::shell::{ColorChoice, Verbosity};
    use std::fs;
    use std::process::Command;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    const POLL: Duration = Duration::from_millis(20);

    fn shell() -> Shell {
        Shell::new(Verbosity::Quiet, ColorChoice::Never)
    }

    fn registry(tmp: &TempDir) -> Registry {
        Registry::new(tmp.path().join("ninja").join("builds_in_flight.tmp"))
    }

    #[test]
    fn test_no_owner_builds_once_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        let ninja = FakeNinja::new(tmp.path())
            .snapshot(registry.path())
            .output("[1/1] CXX main.o")
            .write();
        let shell = shell();
        let coordinator =
            Coordinator::new(Launcher::new(ninja.path(), &registry, &shell), &shell);

        let outcome = coordinator.run("app.ninja", Some("all")).unwrap();

        assert_eq!(outcome.code, 0);
        assert_eq!(ninja.invocations(), ["-f app.ninja all"]);
        assert_eq!(
            ninja.snapshot_contents(),
            format!("app.ninja,{}\n", outcome.pid)
        );
        assert_eq!(registry.lookup("app.ninja").unwrap(), None);
        assert!(!fs::read_to_string(registry.path())
            .unwrap()
            .contains("app.ninja"));
    }

    #[test]
    fn test_returns_build_exit_code() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        let ninja = FakeNinja::new(tmp.path()).exit_code(1).write();
        let shell = shell();
        let coordinator =
            Coordinator::new(Launcher::new(ninja.path(), &registry, &shell), &shell);

        let outcome = coordinator.run("app.ninja", Some("all")).unwrap();

        assert_eq!(outcome.code, 1);
        assert_eq!(registry.lookup("app.ninja").unwrap(), None);
    }

    #[test]
    fn test_sequential_runs_leave_no_entry() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        registry.append("lib.ninja", std::process::id()).unwrap();
        let ninja = FakeNinja::new(tmp.path()).write();
        let shell = shell();
        let coordinator =
            Coordinator::new(Launcher::new(ninja.path(), &registry, &shell), &shell);

        for _ in 0..2 {
            coordinator.run("app.ninja", Some("all")).unwrap();
            assert_eq!(registry.lookup("app.ninja").unwrap(), None);
        }

        assert_eq!(ninja.invocations().len(), 2);
        // Unrelated units are untouched
        assert_eq!(
            registry.lookup("lib.ninja").unwrap(),
            Some(std::process::id())
        );
    }

    #[test]
    fn test_dead_owner_is_replaced_without_blocking() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        let mut dead = Command::new("true").spawn().unwrap();
        let dead_pid = dead.id();
        dead.wait().unwrap();
        registry.append("app.ninja", dead_pid).unwrap();

        let ninja = FakeNinja::new(tmp.path()).write();
        let shell = shell();
        let coordinator = Coordinator::new(Launcher::new(ninja.path(), &registry, &shell), &shell)
            .with_poll_interval(Duration::from_secs(5));

        let start = Instant::now();
        let outcome = coordinator.run("app.ninja", Some("all")).unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.code, 0);
        assert_ne!(outcome.pid, dead_pid);
        assert_eq!(ninja.invocations().len(), 1);
        assert_eq!(registry.lookup("app.ninja").unwrap(), None);
    }

    #[test]
    fn test_live_owner_is_waited_on_then_rebuilt() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        let mut owner = Command::new("sleep").arg("0.6").spawn().unwrap();
        let owner_pid = owner.id();
        registry.append("app.ninja", owner_pid).unwrap();

        let ninja = FakeNinja::new(tmp.path()).exit_code(2).write();
        let shell = shell();
        let coordinator = Coordinator::new(Launcher::new(ninja.path(), &registry, &shell), &shell)
            .with_poll_interval(POLL);

        let start = Instant::now();
        let outcome = coordinator.run("app.ninja", Some("all")).unwrap();
        let elapsed = start.elapsed();
        owner.wait().unwrap();

        assert!(elapsed >= Duration::from_millis(500));
        assert_ne!(outcome.pid, owner_pid);
        assert_eq!(outcome.code, 2);
        assert_eq!(ninja.invocations(), ["-f app.ninja all"]);
        assert_eq!(registry.lookup("app.ninja").unwrap(), None);
    }

    #[test]
    fn test_second_requester_attaches_to_first_build() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        let ninja = FakeNinja::new(tmp.path()).sleep_secs(0.8).write();
        let shell = shell();

        thread::scope(|scope| {
            let first = scope.spawn(|| {
                let coordinator =
                    Coordinator::new(Launcher::new(ninja.path(), &registry, &shell), &shell)
                        .with_poll_interval(POLL);
                coordinator.run("app.ninja", Some("all")).unwrap()
            });

            // Let the first build register itself
            let deadline = Instant::now() + Duration::from_secs(5);
            while registry.lookup("app.ninja").unwrap().is_none() {
                assert!(Instant::now() < deadline, "first build never registered");
                thread::sleep(Duration::from_millis(10));
            }

            let coordinator =
                Coordinator::new(Launcher::new(ninja.path(), &registry, &shell), &shell)
                    .with_poll_interval(POLL);
            let second = coordinator.run("app.ninja", Some("all")).unwrap();
            let first = first.join().unwrap();

            assert_ne!(first.pid, second.pid);
        });

        assert_eq!(ninja.invocations().len(), 2);
        assert_eq!(registry.lookup("app.ninja").unwrap(), None);
    }

    #[test]
    fn test_lookup_race_lets_both_build() {
        // Both requesters look up before either has appended, so both see
        // no owner and both launch. The registry holds two owners at once.
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        let ninja = FakeNinja::new(tmp.path())
            .snapshot(registry.path())
            .sleep_secs(0.5)
            .write();
        let shell = shell();
        let start = Barrier::new(2);

        let (a, b) = thread::scope(|scope| {
            let request = || {
                let coordinator =
                    Coordinator::new(Launcher::new(ninja.path(), &registry, &shell), &shell)
                        .with_poll_interval(POLL)
                        .with_launch_delay(Duration::from_millis(400));
                start.wait();
                coordinator.run("app.ninja", Some("all")).unwrap()
            };
            let a = scope.spawn(request);
            let b = scope.spawn(request);
            (a.join().unwrap(), b.join().unwrap())
        });

        assert_ne!(a.pid, b.pid);
        assert_eq!(ninja.invocations().len(), 2);
        let snapshots = ninja.snapshot_contents();
        assert!(snapshots.contains(&format!("app.ninja,{}", a.pid)));
        assert!(snapshots.contains(&format!("app.ninja,{}", b.pid)));
        assert_eq!(registry.lookup("app.ninja").unwrap(), None);
    }

    #[test]
    fn test_empty_build_file_leaves_other_units_alone() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        registry.append("lib.ninja", std::process::id()).unwrap();
        let ninja = FakeNinja::new(tmp.path()).write();
        let shell = shell();
        let coordinator =
            Coordinator::new(Launcher::new(ninja.path(), &registry, &shell), &shell);

        let err = coordinator.run("", Some("all")).unwrap_err();

        assert!(matches!(err, CoordError::InvalidBuildFile));
        assert!(!ninja.was_invoked());
        assert_eq!(
            registry.lookup("lib.ninja").unwrap(),
            Some(std::process::id())
        );
    }

    #[test]
    fn test_zero_poll_interval_is_raised() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        let shell = shell();
        let coordinator = Coordinator::new(Launcher::new("ninja", &registry, &shell), &shell)
            .with_poll_interval(Duration::ZERO);

        assert_eq!(coordinator.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_invalid_target_spawns_nothing() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        let ninja = FakeNinja::new(tmp.path()).write();
        let shell = shell();
        let coordinator =
            Coordinator::new(Launcher::new(ninja.path(), &registry, &shell), &shell);

        let err = coordinator.run("app.ninja", None).unwrap_err();

        assert!(matches!(err, CoordError::InvalidTarget));
        assert!(!ninja.was_invoked());
        assert!(!registry.exists());
    }

    #[test]
    fn test_spawn_failure_propagates() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp);
        let shell = shell();
        let coordinator = Coordinator::new(
            Launcher::new(tmp.path().join("missing-ninja"), &registry, &shell),
            &shell,
        );

        let err = coordinator.run("app.ninja", Some("all")).unwrap_err();
        assert!(matches!(err, CoordError::Spawn { .. }));
    }
}
