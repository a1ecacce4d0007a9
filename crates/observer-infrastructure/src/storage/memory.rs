//! In-memory session store.

use chrono::{DateTime, Utc};
use observer_core::decision::{DecisionRecord, OutcomeUpdate};
use observer_core::error::{ObserverError, Result};
use observer_core::session::{Session, SessionState, SessionStore};
use std::collections::HashMap;
use std::sync::RwLock;

/// Keeps sessions in a map for the lifetime of the process.
///
/// Honours the same contract as the durable stores, so it can stand in for
/// them in tests.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Session) -> Result<T>,
    ) -> Result<T> {
        let mut sessions = self.sessions.write()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ObserverError::not_found("session", session_id))?;
        f(session)
    }
}

impl SessionStore for InMemorySessionStore {
    fn create_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write()?;
        if sessions.contains_key(&session.id) {
            return Err(ObserverError::internal(format!(
                "session '{}' already exists",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn append(&self, session_id: &str, record: &DecisionRecord) -> Result<()> {
        self.with_session(session_id, |session| {
            if !session.is_open() {
                return Err(ObserverError::invalid_session_state(
                    session_id,
                    session.state,
                    "append to",
                ));
            }
            session.records.push(record.clone());
            Ok(())
        })
    }

    fn update_outcome(
        &self,
        session_id: &str,
        record_id: &str,
        update: &OutcomeUpdate,
    ) -> Result<()> {
        self.with_session(session_id, |session| {
            let record = session
                .find_record_mut(record_id)
                .ok_or_else(|| ObserverError::not_found("decision record", record_id))?;
            record.outcome = Some(update.status);
            if let Some(metrics) = &update.metrics {
                record.performance_metrics = Some(metrics.clone());
            }
            Ok(())
        })
    }

    fn close_session(&self, session_id: &str, closed_at: DateTime<Utc>) -> Result<()> {
        self.with_session(session_id, |session| {
            if session.state == SessionState::Open {
                session.state = SessionState::Closed;
                session.closed_at = Some(closed_at);
            }
            Ok(())
        })
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read()?.get(session_id).cloned())
    }

    fn list_open_sessions(&self) -> Result<Vec<String>> {
        let sessions = self.sessions.read()?;
        let mut open: Vec<&Session> = sessions.values().filter(|s| s.is_open()).collect();
        open.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));
        Ok(open.into_iter().map(|s| s.id.clone()).collect())
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.read()?.values().cloned().collect();
        sessions.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }
}
