//! Data directory layout for Parley.

use std::path::{Path, PathBuf};

/// Resolve the data directory.
///
/// `PARLEY_DATA_DIR` wins; otherwise `~/.parley`, or `./.parley` when no
/// home directory is known.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARLEY_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".parley");
    }

    PathBuf::from(".parley")
}

/// `{data_dir}/config.toml`
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// `{data_dir}/session.json`
pub fn credentials_path(data_dir: &Path) -> PathBuf {
    data_dir.join("session.json")
}
