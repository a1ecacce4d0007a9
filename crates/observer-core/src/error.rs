//! Error types for the observer engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the whole observer workspace.
///
/// Every failure surfaced by the engine is recoverable by the caller: nothing
/// here is fatal to the host process.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObserverError {
    /// An append, close or outcome update was attempted in the wrong session state.
    #[error("Invalid session state: cannot {operation} session '{session_id}' while {state}")]
    InvalidSessionState {
        session_id: String,
        state: String,
        operation: String,
    },

    /// A decision is missing required fields or is internally inconsistent.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// An adapter recognised the agent family but the payload shape is invalid.
    #[error("Unsupported format for adapter '{adapter}': {reason}")]
    UnsupportedFormat { adapter: String, reason: String },

    /// No adapter recognised the agent family of the input.
    #[error("Unknown input: {0}")]
    UnknownInput(String),

    /// The backing store could not complete the operation.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An analytics request had no terminal records to work with.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The record already carries a terminal outcome.
    #[error("Outcome of record '{record_id}' is already final ({status})")]
    OutcomeAlreadyFinal { record_id: String, status: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ObserverError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an InvalidSessionState error
    pub fn invalid_session_state(
        session_id: impl Into<String>,
        state: impl std::fmt::Display,
        operation: impl Into<String>,
    ) -> Self {
        Self::InvalidSessionState {
            session_id: session_id.into(),
            state: state.to_string(),
            operation: operation.into(),
        }
    }

    /// Creates an InvalidRecord error
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }

    /// Creates an UnsupportedFormat error
    pub fn unsupported_format(adapter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            adapter: adapter.into(),
            reason: reason.into(),
        }
    }

    /// Creates an UnknownInput error
    pub fn unknown_input(message: impl Into<String>) -> Self {
        Self::UnknownInput(message.into())
    }

    /// Creates a StorageUnavailable error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable(message.into())
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is an InvalidSessionState error
    pub fn is_invalid_session_state(&self) -> bool {
        matches!(self, Self::InvalidSessionState { .. })
    }

    /// Check if this is an InvalidRecord error
    pub fn is_invalid_record(&self) -> bool {
        matches!(self, Self::InvalidRecord(_))
    }

    /// Check if this is an UnsupportedFormat error
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Self::UnsupportedFormat { .. })
    }

    /// Check if this is an UnknownInput error
    pub fn is_unknown_input(&self) -> bool {
        matches!(self, Self::UnknownInput(_))
    }

    /// Check if this is a StorageUnavailable error
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for failures produced while normalising agent output.
    ///
    /// These are reported to the integration code and must never be coerced
    /// into a default record.
    pub fn is_normalization_failure(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. } | Self::UnknownInput(_) | Self::InvalidRecord(_)
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ObserverError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for ObserverError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ObserverError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ObserverError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for ObserverError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("lock poisoned: {}", err))
    }
}

/// A type alias for `Result<T, ObserverError>`.
pub type Result<T> = std::result::Result<T, ObserverError>;
