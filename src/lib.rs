//! inflight - single-build-in-flight coordination for ninja-style builds
//!
//! This crate lets several processes on one host request builds of the same
//! build file without stepping on each other: the first one builds, later
//! ones wait for it and then run their own (usually no-op) build.

pub mod coord;
pub mod ops;
pub mod util;

/// Test fixtures for inflight unit tests.
///
/// Only available when compiling tests. Provides a scriptable fake build
/// executor.
#[cfg(test)]
pub mod test_support;

pub use coord::{CoordError, Coordinator, LaunchOutcome, Launcher, Registry, RegistryLock};
pub use util::context::GlobalContext;
