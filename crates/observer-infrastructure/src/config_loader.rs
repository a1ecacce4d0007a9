//! Configuration loading.
//!
//! Reads `ObserverConfig` from a TOML file (by default
//! `~/.config/agent-observer/config.toml`). A missing file yields the
//! defaults; a malformed or invalid one is an error.

use crate::paths::ObserverPaths;
use crate::storage::atomic_file::write_atomic;
use observer_core::config::ObserverConfig;
use observer_core::error::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Loads and caches the observer configuration.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
    /// Cached configuration, filled on first load.
    cache: Arc<RwLock<Option<ObserverConfig>>>,
}

impl ConfigLoader {
    /// A loader for an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// A loader for the platform default location.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(ObserverPaths::config_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration, reading the file on first access.
    pub fn load(&self) -> Result<ObserverConfig> {
        if let Some(cached) = self.cache.read()?.as_ref() {
            return Ok(cached.clone());
        }

        let loaded = Self::read_file(&self.path)?;
        *self.cache.write()? = Some(loaded.clone());
        Ok(loaded)
    }

    /// Forces a reload on next access.
    pub fn invalidate_cache(&self) -> Result<()> {
        *self.cache.write()? = None;
        Ok(())
    }

    /// Validates and writes `config` to the file atomically.
    pub fn save(&self, config: &ObserverConfig) -> Result<()> {
        config.validate()?;
        write_atomic(&self.path, config.to_toml_string()?.as_bytes())?;
        *self.cache.write()? = Some(config.clone());
        tracing::info!(path = %self.path.display(), "Saved observer configuration");
        Ok(())
    }

    fn read_file(path: &Path) -> Result<ObserverConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = ObserverConfig::from_toml_str(&content)?;
                tracing::debug!(path = %path.display(), "Loaded observer configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No configuration file, using defaults");
                Ok(ObserverConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
