//! Errors raised by the build coordination protocol.
//!
//! A build that runs and exits non-zero is not an error here: it comes back
//! as an ordinary exit code in [`LaunchOutcome`](super::LaunchOutcome).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for coordination operations.
pub type CoordResult<T> = Result<T, CoordError>;

/// Protocol-level failure.
#[derive(Debug, Error)]
pub enum CoordError {
    #[error("invalid build target: a non-empty target name is required")]
    InvalidTarget,

    /// An empty build file would match every registry line.
    #[error("invalid build file: a non-empty build file path is required")]
    InvalidBuildFile,

    #[error("failed to spawn `{program}`")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for build process (pid {pid})")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to access build registry {}", path.display())]
    Registry {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to lock {}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CoordError {
    /// The OS error code behind this failure, if there is one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            CoordError::InvalidTarget | CoordError::InvalidBuildFile => None,
            CoordError::Spawn { source, .. }
            | CoordError::Wait { source, .. }
            | CoordError::Registry { source, .. }
            | CoordError::Lock { source, .. } => source.raw_os_error(),
        }
    }

    pub(crate) fn registry(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CoordError::Registry {
            path: path.into(),
            source,
        }
    }
}
