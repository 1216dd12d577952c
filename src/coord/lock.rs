//! Cross-process lock guarding the build registry.
//!
//! The lock is an advisory exclusive lock on a side-car file named
//! `<registry>.lock`. It only serializes access to the registry file; it says
//! nothing about which builds are running. The side-car file is never deleted.
//!
//! A holder that dies while holding the lock releases it implicitly, since the
//! OS drops advisory locks with the file descriptor. A holder that hangs keeps
//! every other process blocked; there is no timeout.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::error::{CoordError, CoordResult};

/// Named lock for one registry file.
#[derive(Debug, Clone)]
pub struct RegistryLock {
    path: PathBuf,
}

/// Held lock. Released when dropped.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl RegistryLock {
    /// Lock protecting `registry`, stored at `<registry>.lock`.
    pub fn for_registry(registry: &Path) -> Self {
        let mut name = OsString::from(registry.as_os_str());
        name.push(".lock");
        RegistryLock {
            path: PathBuf::from(name),
        }
    }

    /// Path of the side-car lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the lock is held by this process.
    pub fn acquire(&self) -> CoordResult<LockGuard> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| self.error(source))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| self.error(source))?;

        FileExt::lock_exclusive(&file).map_err(|source| self.error(source))?;
        tracing::trace!(lock = %self.path.display(), "acquired registry lock");

        Ok(LockGuard {
            file,
            path: self.path.clone(),
        })
    }

    /// Run `operation` while holding the lock.
    ///
    /// The lock is released on every exit path of `operation`, including
    /// early returns and unwinding.
    pub fn with<T>(&self, operation: impl FnOnce() -> CoordResult<T>) -> CoordResult<T> {
        let guard = self.acquire()?;
        let result = operation();
        drop(guard);
        result
    }

    fn error(&self, source: std::io::Error) -> CoordError {
        CoordError::Lock {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to release {}: {}", self.path.display(), e);
        }
    }
}
