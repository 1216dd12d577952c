//! Single-build-in-flight coordination.
//!
//! Several processes on one host may ask for the same build file to be built
//! at the same time. They cooperate through a shared registry file that maps
//! each build unit to the pid currently building it:
//!
//! - [`RegistryLock`] serializes access to the registry file.
//! - [`Registry`] reads and rewrites the `<unit>,<pid>` records.
//! - [`Launcher`] runs the build executor and records it as in flight.
//! - [`Coordinator`] decides between building now and waiting for the
//!   owner of an in-flight build, and cleans the registry up afterwards.

pub mod coordinator;
pub mod error;
pub mod launcher;
pub mod lock;
pub mod owner;
pub mod registry;

pub use coordinator::Coordinator;
pub use error::{CoordError, CoordResult};
pub use launcher::{LaunchOutcome, Launcher};
pub use lock::{LockGuard, RegistryLock};
pub use owner::{wait_for_owner, OwnerWait};
pub use registry::{Registry, RegistryEntry, REGISTRY_FILE_NAME};
