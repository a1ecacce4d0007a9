//! Session store trait.
//!
//! Defines the interface the session manager persists through.

use super::model::Session;
use crate::decision::{DecisionRecord, OutcomeUpdate};
use crate::error::Result;
use chrono::{DateTime, Utc};

/// An abstract store for sessions and their decision records.
///
/// This trait decouples the session manager from the storage mechanism
/// (in-memory map, JSON-lines directory, database). An in-memory
/// implementation must honour the same contract as a durable one.
///
/// Operations are synchronous and expected to be short; callers impose their
/// own deadlines if a backend is slow.
///
/// # Implementation Notes
///
/// - Failures of the backend are reported as `ObserverError::StorageUnavailable`.
/// - `append` for a given session is only ever called by one writer at a time;
///   records must be kept in the order they were appended.
pub trait SessionStore: Send + Sync {
    /// Persists a newly opened session (without records).
    fn create_session(&self, session: &Session) -> Result<()>;

    /// Appends a record to the session's record sequence.
    ///
    /// # Arguments
    ///
    /// * `session_id` - The owning session
    /// * `record` - The record to append
    fn append(&self, session_id: &str, record: &DecisionRecord) -> Result<()>;

    /// Persists an outcome transition of an existing record, with the
    /// performance metrics it carries.
    ///
    /// The caller has already checked that the record exists and that the
    /// transition is allowed. A store may still reject an unknown record with
    /// `NotFound`, or accept the update and ignore it when loading.
    fn update_outcome(&self, session_id: &str, record_id: &str, update: &OutcomeUpdate)
    -> Result<()>;

    /// Marks a session closed.
    fn close_session(&self, session_id: &str, closed_at: DateTime<Utc>) -> Result<()>;

    /// Loads a session with all of its records.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    fn load_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Lists the ids of sessions that are still open.
    fn list_open_sessions(&self) -> Result<Vec<String>>;

    /// Lists all stored sessions with their records.
    fn list_sessions(&self) -> Result<Vec<Session>>;
}
