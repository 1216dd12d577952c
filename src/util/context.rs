//! Global context for inflight operations.
//!
//! Resolves the paths every command needs once at startup: the working
//! directory, the user's home for global configuration, and the build tree
//! root holding `settings.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;

use crate::util::config::{load_config, Config};
use crate::util::settings::{find_root, settings_path, BuildSettings, SETTINGS_REL_PATH};

/// Directory name for inflight configuration, both global and per tree.
const CONFIG_DIR_NAME: &str = ".inflight";

/// Global context containing configuration paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global inflight data (~/.inflight/)
    home: PathBuf,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let home = BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(CONFIG_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME));

        Ok(GlobalContext { cwd, home })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Override the home directory.
    pub fn with_home(mut self, home: PathBuf) -> Self {
        self.home = home;
        self
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the inflight home directory (~/.inflight/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Find the build tree root (directory containing build/config/settings.json).
    pub fn find_root(&self) -> Option<PathBuf> {
        find_root(&self.cwd)
    }

    /// Get the project configuration file path for the tree at `root`.
    pub fn project_config_path(&self, root: &Path) -> PathBuf {
        root.join(CONFIG_DIR_NAME).join("config.toml")
    }

    /// Load global and, when inside a build tree, project configuration.
    pub fn load_config(&self) -> Config {
        let project = self
            .find_root()
            .map(|root| self.project_config_path(&root))
            .unwrap_or_else(|| self.cwd.join(CONFIG_DIR_NAME).join("config.toml"));
        load_config(&self.config_path(), &project)
    }

    /// Registry file of the enclosing build tree.
    pub fn registry_path(&self) -> Result<PathBuf> {
        let root = self.find_root().with_context(|| {
            format!(
                "no {} found in {} or any parent directory; pass --registry",
                SETTINGS_REL_PATH,
                self.cwd.display()
            )
        })?;
        let settings = BuildSettings::load(&settings_path(&root))?;
        Ok(settings.registry_path(&root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree(tmp: &TempDir) -> PathBuf {
        let root = tmp.path().join("engine");
        let settings = settings_path(&root);
        fs::create_dir_all(settings.parent().unwrap()).unwrap();
        fs::write(
            settings,
            r#"{"intermediate_folder": ".rex", "build_folder": "build"}"#,
        )
        .unwrap();
        root
    }

    #[test]
    fn test_context_paths() {
        let ctx = GlobalContext::new().unwrap();
        assert!(ctx.cwd().is_absolute());
        assert!(ctx.config_path().ends_with(".inflight/config.toml"));
    }

    #[test]
    fn test_registry_path_from_nested_dir() {
        let tmp = TempDir::new().unwrap();
        let root = tree(&tmp);
        let nested = root.join("source/runtime");
        fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested).unwrap();
        assert_eq!(ctx.find_root(), Some(root.clone()));
        assert_eq!(
            ctx.registry_path().unwrap(),
            root.join(".rex/build/ninja/builds_in_flight.tmp")
        );
    }

    #[test]
    fn test_registry_path_outside_tree() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();

        let err = ctx.registry_path().unwrap_err();
        assert!(err.to_string().contains("--registry"));
    }

    #[test]
    fn test_project_config_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let root = tree(&tmp);
        let home = tmp.path().join("home");

        fs::create_dir_all(&home).unwrap();
        fs::write(
            home.join("config.toml"),
            "[launcher]\nexe = \"/usr/bin/ninja\"\npoll_interval_ms = 900\n",
        )
        .unwrap();
        fs::create_dir_all(root.join(".inflight")).unwrap();
        fs::write(
            root.join(".inflight/config.toml"),
            "[launcher]\npoll_interval_ms = 50\n",
        )
        .unwrap();

        let ctx = GlobalContext::with_cwd(root).unwrap().with_home(home);
        let config = ctx.load_config();

        assert_eq!(config.launcher.exe, Some(PathBuf::from("/usr/bin/ninja")));
        assert_eq!(config.launcher.poll_interval_ms, Some(50));
    }
}
