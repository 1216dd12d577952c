//! Build tree settings.
//!
//! The generated build tree carries `build/config/settings.json`, which names
//! the intermediate and build folders. The builds-in-flight registry lives
//! under them, so every coordinator working on the same tree agrees on its
//! location.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::coord::REGISTRY_FILE_NAME;

/// Location of the settings file relative to the build tree root.
pub const SETTINGS_REL_PATH: &str = "build/config/settings.json";

/// Folder names read from `settings.json`. Other keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    pub intermediate_folder: String,
    pub build_folder: String,
}

impl BuildSettings {
    /// Load settings from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings file: {}", path.display()))
    }

    /// Load the settings of the build tree rooted at `root`.
    pub fn load_from_root(root: &Path) -> Result<Self> {
        Self::load(&settings_path(root))
    }

    /// Folder holding ninja files for the tree rooted at `root`.
    pub fn ninja_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.intermediate_folder)
            .join(&self.build_folder)
            .join("ninja")
    }

    /// Registry file for the tree rooted at `root`.
    pub fn registry_path(&self, root: &Path) -> PathBuf {
        self.ninja_dir(root).join(REGISTRY_FILE_NAME)
    }
}

/// Path of the settings file under `root`.
pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_REL_PATH)
}

/// Find the build tree root at or above `start`.
pub fn find_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| settings_path(dir).is_file())
        .map(Path::to_path_buf)
}
