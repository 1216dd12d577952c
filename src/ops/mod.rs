//! High-level operations.

pub mod build;
pub mod passes;

pub use build::{build, BuildOptions};
pub use passes::{run_programs, PassResults};
