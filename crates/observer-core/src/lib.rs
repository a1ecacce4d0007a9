pub mod adapter;
pub mod analytics;
pub mod config;
pub mod decision;
pub mod error;
pub mod session;

// Re-export common error type
pub use error::{ObserverError, Result};
