//! Builds the configured session store.

use crate::paths::ObserverPaths;
use crate::storage::{InMemorySessionStore, JsonDirSessionStore};
use observer_core::config::{StorageBackend, StorageConfig};
use observer_core::error::Result;
use observer_core::session::SessionStore;
use std::sync::Arc;

/// Creates the store selected by `config`.
///
/// The `json_dir` backend uses `config.path`, or the platform sessions
/// directory when no path is given.
pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn SessionStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::debug!("Using in-memory session store");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
        StorageBackend::JsonDir => {
            let dir = match &config.path {
                Some(path) => path.clone(),
                None => ObserverPaths::sessions_dir()?,
            };
            tracing::debug!(dir = %dir.display(), "Using json_dir session store");
            Ok(Arc::new(JsonDirSessionStore::new(dir)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use observer_core::session::Session;
    use tempfile::TempDir;

    #[test]
    fn test_json_dir_uses_configured_path() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::JsonDir,
            path: Some(temp_dir.path().join("sessions")),
        };
        let store = build_store(&config).unwrap();
        store
            .create_session(&Session::open("s-1", "run", Utc::now()))
            .unwrap();
        assert!(temp_dir.path().join("sessions").join("s-1.jsonl").exists());
    }

    #[test]
    fn test_memory_backend() {
        let store = build_store(&StorageConfig::default()).unwrap();
        assert!(store.list_sessions().unwrap().is_empty());
    }
}
