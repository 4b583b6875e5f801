//! Where meshcfg keeps its configuration

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Overrides the configuration directory
pub const CONFIG_DIR_ENV: &str = "MESHCFG_CONFIG_DIR";

/// `$MESHCFG_CONFIG_DIR`, else `$XDG_CONFIG_HOME/meshcfg` (`~/.config/meshcfg`)
pub fn config_dir() -> PathBuf {
    resolve_config_dir(std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from))
}

fn resolve_config_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| ProjectDirs::from("", "", "meshcfg").map(|dirs| dirs.config_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from(".meshcfg"))
}

/// Get the root configuration file path
pub fn root_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
