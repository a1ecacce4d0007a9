//! Platform paths for observer configuration and session data.
//!
//! ```text
//! ~/.config/agent-observer/          # Config directory
//! └── config.toml                    # Engine configuration
//!
//! ~/.local/share/agent-observer/     # Data directory
//! └── sessions/                      # json_dir session logs
//! ```

use observer_core::error::ObserverError;
use std::path::PathBuf;

const APP_DIR: &str = "agent-observer";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for ObserverError {
    fn from(e: PathError) -> Self {
        ObserverError::config(e.to_string())
    }
}

/// Resolves observer directories on the current platform.
pub struct ObserverPaths;

impl ObserverPaths {
    /// Returns the configuration directory (e.g. `~/.config/agent-observer/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the data directory (e.g. `~/.local/share/agent-observer/`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the default directory of the `json_dir` session store.
    pub fn sessions_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("sessions"))
    }
}
