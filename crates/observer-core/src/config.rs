//! Engine configuration.
//!
//! All values are supplied externally (usually from `config.toml`); nothing in
//! the engine reads a global default at run time.

use crate::analytics::{BucketWidth, MinSupport};
use crate::error::{ObserverError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration of an observer engine instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub storage: StorageConfig,
    pub analytics: AnalyticsConfig,
    pub sessions: SessionConfig,
}

impl ObserverConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.analytics.validate()
    }
}

/// Which backend sessions are persisted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    JsonDir,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the `json_dir` backend. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub trend_bucket: BucketWidth,
    pub min_support: MinSupport,
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<()> {
        match self.trend_bucket {
            BucketWidth::Duration { seconds: 0 } => {
                return Err(ObserverError::config("trend_bucket.seconds must be positive"));
            }
            BucketWidth::Count { size: 0 } => {
                return Err(ObserverError::config("trend_bucket.size must be positive"));
            }
            _ => {}
        }
        match self.min_support {
            MinSupport::Count { value: 0 } => {
                Err(ObserverError::config("min_support.value must be positive"))
            }
            MinSupport::Ratio { value } if !(value > 0.0 && value <= 1.0) => Err(
                ObserverError::config("min_support ratio must lie in (0, 1]"),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// When set, outcome updates are rejected once a session is closed.
    pub seal_on_close: bool,
}
