//! Platform paths for config and data.

use std::fs;
use std::path::PathBuf;

/// Config directory: `~/.config/cloudspend/` (platform equivalent).
pub fn config_dir() -> PathBuf {
    if let Some(dir) = dirs::config_dir() {
        dir.join("cloudspend")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".cloudspend")
    } else {
        PathBuf::from(".cloudspend")
    }
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Data directory: `~/.local/share/cloudspend/` (platform equivalent).
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        dir.join("cloudspend")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".cloudspend")
    } else {
        PathBuf::from(".cloudspend")
    }
}

pub fn db_path() -> PathBuf {
    data_dir().join("cloudspend.db")
}

/// Create config and data directories if missing.
pub fn ensure_dirs() -> std::io::Result<()> {
    fs::create_dir_all(config_dir())?;
    fs::create_dir_all(data_dir())?;
    Ok(())
}
