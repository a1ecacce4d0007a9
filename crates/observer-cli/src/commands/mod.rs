pub mod ingest;
pub mod outcome;
pub mod report;
pub mod sessions;

use anyhow::{Context, Result};
use observer_application::ObserverService;
use observer_core::config::ObserverConfig;

/// Builds the engine for one command invocation.
pub fn build_service(config: ObserverConfig) -> Result<ObserverService> {
    ObserverService::with_defaults(config).context("Failed to initialise the session store")
}
