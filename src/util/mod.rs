//! Shared utilities

pub mod config;
pub mod context;
pub mod process;
pub mod settings;
pub mod shell;

pub use config::Config;
pub use context::GlobalContext;
pub use settings::BuildSettings;
pub use shell::Shell;
