//! The builds-in-flight registry.
//!
//! A plain text file shared by every coordinator on the host. Each line is
//! `<build file>,<pid>` with no header. Lookups and removals match a build
//! unit by substring containment of the key anywhere in the line, so a unit
//! whose name is contained in another unit's name matches that unit's lines
//! too. Callers are expected to use full build-file paths as keys. An empty
//! key matches every line; the coordinator and launcher reject it.
//!
//! Every operation takes the registry lock for its own duration only.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::error::{CoordError, CoordResult};
use super::lock::RegistryLock;

/// Default registry file name inside the build tree's ninja folder.
pub const REGISTRY_FILE_NAME: &str = "builds_in_flight.tmp";

/// One parsed registry line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Build unit key, as written by the launcher.
    pub unit: String,
    /// Process that owns the in-flight build.
    pub pid: u32,
}

impl RegistryEntry {
    /// Parse a `<unit>,<pid>` line. The pid is the field after the last comma.
    pub fn parse(line: &str) -> Option<Self> {
        let (unit, pid) = line.trim_end().rsplit_once(',')?;
        let pid = pid.trim().parse().ok()?;
        Some(RegistryEntry {
            unit: unit.to_string(),
            pid,
        })
    }

    fn to_line(&self) -> String {
        format!("{},{}\n", self.unit, self.pid)
    }
}

/// Handle to a registry file and its lock.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    lock: RegistryLock,
}

impl Registry {
    /// Open the registry stored at `path`. Nothing is created until the
    /// first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = RegistryLock::for_registry(&path);
        Registry { path, lock }
    }

    /// Path of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the registry file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Owner of the build of `unit`, if one is recorded.
    ///
    /// When several lines match, the last one wins.
    pub fn lookup(&self, unit: &str) -> CoordResult<Option<u32>> {
        self.lock.with(|| {
            let Some(contents) = self.read()? else {
                return Ok(None);
            };

            let mut owner = None;
            for line in contents.lines().filter(|line| line.contains(unit)) {
                match RegistryEntry::parse(line) {
                    Some(entry) => owner = Some(entry.pid),
                    None => tracing::warn!(
                        "ignoring malformed line in {}: {:?}",
                        self.path.display(),
                        line
                    ),
                }
            }
            Ok(owner)
        })
    }

    /// Record `pid` as the owner of the build of `unit`.
    pub fn append(&self, unit: &str, pid: u32) -> CoordResult<()> {
        let entry = RegistryEntry {
            unit: unit.to_string(),
            pid,
        };

        self.lock.with(|| {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|e| self.error(e))?;
                }
            }

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| self.error(e))?;
            file.write_all(entry.to_line().as_bytes())
                .map_err(|e| self.error(e))?;

            tracing::debug!(unit, pid, "registered build in flight");
            Ok(())
        })
    }

    /// Drop every line that mentions `unit`.
    pub fn remove(&self, unit: &str) -> CoordResult<()> {
        self.lock.with(|| {
            let Some(contents) = self.read()? else {
                return Ok(());
            };

            let kept: String = contents
                .split_inclusive('\n')
                .filter(|line| !line.contains(unit))
                .collect();
            if kept.len() == contents.len() {
                return Ok(());
            }

            self.replace(kept.as_bytes()).map_err(|e| self.error(e))?;
            tracing::trace!(unit, "removed build from registry");
            Ok(())
        })
    }

    /// All parseable entries, in file order.
    pub fn entries(&self) -> CoordResult<Vec<RegistryEntry>> {
        self.lock.with(|| {
            Ok(self
                .read()?
                .map(|contents| contents.lines().filter_map(RegistryEntry::parse).collect())
                .unwrap_or_default())
        })
    }

    /// Read the file, `None` if it does not exist. Caller holds the lock.
    fn read(&self) -> CoordResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.error(e)),
        }
    }

    /// Atomically replace the file contents. Caller holds the lock.
    fn replace(&self, contents: &[u8]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn error(&self, source: io::Error) -> CoordError {
        CoordError::registry(&self.path, source)
    }
}
