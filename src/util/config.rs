//! `config.toml` support.
//!
//! `~/.inflight/config.toml` holds user-wide defaults and
//! `<root>/.inflight/config.toml` overrides them for one build tree. CLI
//! flags override both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::coord::owner::{DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};

/// inflight configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build launcher settings
    pub launcher: LauncherConfig,
}

/// Launcher-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Build executor used when `-exe` is not given (e.g., /usr/bin/ninja)
    pub exe: Option<PathBuf>,

    /// Interval between liveness checks of a build owned by another process
    pub poll_interval_ms: Option<u64>,

    /// Wall-clock limit for a single build, in seconds
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Parse the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Like [`Config::load`], but a missing or broken file yields the
    /// defaults. Broken files are logged.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("ignoring config {}: {:#}", path.display(), e);
            Self::default()
        })
    }

    /// Overlay the values set in `other`.
    pub fn merge(&mut self, other: Config) {
        let (ours, theirs) = (&mut self.launcher, other.launcher);
        ours.exe = theirs.exe.or(ours.exe.take());
        ours.poll_interval_ms = theirs.poll_interval_ms.or(ours.poll_interval_ms);
        ours.timeout_secs = theirs.timeout_secs.or(ours.timeout_secs);
    }

    /// Owner poll interval, falling back to the built-in default and never
    /// below [`MIN_POLL_INTERVAL`].
    pub fn poll_interval(&self) -> Duration {
        self.launcher
            .poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
            .max(MIN_POLL_INTERVAL)
    }

    /// Build timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.launcher.timeout_secs.map(Duration::from_secs)
    }
}

/// Global config overridden by project config. Missing files are skipped.
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    [global_path, project_path]
        .into_iter()
        .filter(|path| path.exists())
        .fold(Config::default(), |mut config, path| {
            config.merge(Config::load_or_default(path));
            config
        })
}
