use super::guard::SessionGuard;
use super::model::{Session, SessionState, SessionSummary};
use super::repository::SessionStore;
use crate::analytics::RecordFilter;
use crate::config::SessionConfig;
use crate::decision::{DecisionDraft, DecisionRecord, OutcomeUpdate};
use crate::error::{ObserverError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// In-memory state of one session.
///
/// All appends and the close transition take the write lock, so they are
/// serialized per session. Readers see either the state before or after an
/// append, never a partial record.
#[derive(Debug)]
pub(crate) struct SessionCell {
    slot: RwLock<SessionSlot>,
}

#[derive(Debug)]
struct SessionSlot {
    session: Session,
    /// False while a close has been applied in memory but not yet persisted.
    close_persisted: bool,
}

impl SessionCell {
    fn new(session: Session) -> Self {
        let close_persisted = !session.is_open();
        Self {
            slot: RwLock::new(SessionSlot {
                session,
                close_persisted,
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SessionSlot>> {
        Ok(self.slot.read()?)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SessionSlot>> {
        Ok(self.slot.write()?)
    }
}

/// A cheap, cloneable reference to an open or closed session.
///
/// Handles can be shared across threads; every `record` through any clone is
/// appended to the same session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    cell: Arc<SessionCell>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state of the session.
    pub fn state(&self) -> Result<SessionState> {
        Ok(self.cell.read()?.session.state)
    }
}

/// Owns observation sessions and serializes appends into them.
///
/// `SessionManager` is responsible for:
/// - Opening sessions and issuing their identifiers (at most once each)
/// - Validating and appending decision records
/// - Closing sessions exactly once, idempotently for repeated calls
/// - Outcome updates on recorded decisions
/// - Read-only snapshots for analytics
///
/// Cloning the manager yields another reference to the same sessions.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<SessionCell>>>>,
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    /// Creates a new `SessionManager` on top of a store backend.
    ///
    /// # Arguments
    ///
    /// * `store` - The backend sessions and records are persisted through
    /// * `config` - Session behaviour (e.g. sealing on close)
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            store,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens a new session and returns a scoped guard for it.
    ///
    /// The session is closed when the guard is dropped, whichever way the
    /// owning scope exits.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot persist the session.
    pub fn open_session(&self, label: impl Into<String>) -> Result<SessionGuard> {
        let handle = self.open_handle(label.into())?;
        Ok(SessionGuard::new(self.clone(), handle))
    }

    fn open_handle(&self, label: String) -> Result<SessionHandle> {
        let id = Uuid::new_v4().to_string();
        let session = Session::open(id.clone(), label, Utc::now());
        self.store.create_session(&session)?;

        let cell = Arc::new(SessionCell::new(session));
        let mut sessions = self.sessions.write()?;
        match sessions.entry(id.clone()) {
            Entry::Occupied(_) => Err(ObserverError::internal(format!(
                "session id '{}' issued twice",
                id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(cell.clone());
                tracing::info!(session_id = %id, "Opened observation session");
                Ok(SessionHandle { id, cell })
            }
        }
    }

    /// Runs `f` inside a fresh session and closes it on every exit path.
    ///
    /// The error of `f` takes precedence over a close failure.
    pub fn with_session<T, F>(&self, label: impl Into<String>, f: F) -> Result<T>
    where
        F: FnOnce(&SessionHandle) -> Result<T>,
    {
        let guard = self.open_session(label)?;
        let result = f(guard.handle());
        let closed = guard.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Validates a draft and appends it to the session as a new record.
    ///
    /// The record id and timestamp are assigned here. Timestamps are strictly
    /// increasing within a session.
    ///
    /// # Errors
    ///
    /// - `InvalidSessionState` if the session is closed
    /// - `InvalidRecord` if the draft fails validation
    /// - `StorageUnavailable` if the store rejects the append; the session is
    ///   left unchanged
    pub fn record(&self, handle: &SessionHandle, draft: DecisionDraft) -> Result<DecisionRecord> {
        let mut slot = handle.cell.write()?;
        let session = &mut slot.session;
        if !session.is_open() {
            return Err(ObserverError::invalid_session_state(
                &session.id,
                session.state,
                "record into",
            ));
        }
        draft.validate()?;

        let timestamp = next_timestamp(session.last_timestamp());
        let record = DecisionRecord::from_draft(
            draft,
            Uuid::new_v4().to_string(),
            session.id.clone(),
            timestamp,
        );

        self.store.append(&session.id, &record).inspect_err(|e| {
            tracing::warn!(session_id = %session.id, error = %e, "Failed to persist decision record");
        })?;
        session.records.push(record.clone());

        tracing::debug!(
            session_id = %session.id,
            record_id = %record.id,
            agent_id = %record.agent_id,
            chosen = %record.chosen,
            "Recorded decision"
        );
        Ok(record)
    }

    /// Closes a session, freezing its record sequence.
    ///
    /// Closing an already closed session is a no-op. If a previous close could
    /// not be persisted, persisting is retried.
    pub fn close_session(&self, handle: &SessionHandle) -> Result<()> {
        let mut slot = handle.cell.write()?;
        if slot.session.state == SessionState::Closed && slot.close_persisted {
            return Ok(());
        }

        let closed_at = match slot.session.closed_at {
            Some(at) => at,
            None => {
                let now = Utc::now();
                let at = slot.session.last_timestamp().map_or(now, |last| last.max(now));
                slot.session.state = SessionState::Closed;
                slot.session.closed_at = Some(at);
                at
            }
        };

        self.store
            .close_session(&slot.session.id, closed_at)
            .inspect_err(|e| {
                tracing::warn!(session_id = %handle.id, error = %e, "Failed to persist session close");
            })?;
        slot.close_persisted = true;

        tracing::info!(
            session_id = %handle.id,
            decisions = slot.session.records.len(),
            "Closed observation session"
        );
        Ok(())
    }

    /// Closes a session by id, loading it from the store if needed.
    pub fn close_by_id(&self, session_id: &str) -> Result<()> {
        let handle = self.handle_or_load(session_id)?;
        self.close_session(&handle)
    }

    /// Sets the outcome of a recorded decision, together with any performance
    /// metrics the update carries.
    ///
    /// Outcome updates remain allowed after close unless `seal_on_close` is set.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the session or record does not exist
    /// - `InvalidSessionState` if the session is closed and sealed
    /// - `OutcomeAlreadyFinal` if the record already succeeded or failed
    pub fn update_outcome(
        &self,
        session_id: &str,
        record_id: &str,
        update: impl Into<OutcomeUpdate>,
    ) -> Result<DecisionRecord> {
        let update = update.into();
        let handle = self.handle_or_load(session_id)?;
        let mut slot = handle.cell.write()?;
        if !slot.session.is_open() && self.config.seal_on_close {
            return Err(ObserverError::invalid_session_state(
                session_id,
                "sealed",
                "update outcomes in",
            ));
        }

        let record = slot
            .session
            .find_record_mut(record_id)
            .ok_or_else(|| ObserverError::not_found("decision record", record_id))?;

        let mut updated = record.clone();
        updated.apply_outcome(update.clone())?;
        if updated != *record {
            self.store.update_outcome(session_id, record_id, &update)?;
            *record = updated.clone();
        }

        tracing::debug!(
            session_id,
            record_id,
            status = %update.status,
            with_metrics = update.metrics.is_some(),
            "Updated decision outcome"
        );
        Ok(updated)
    }

    /// Returns a handle for a session known to this manager.
    pub fn handle(&self, session_id: &str) -> Result<SessionHandle> {
        let sessions = self.sessions.read()?;
        sessions
            .get(session_id)
            .map(|cell| SessionHandle {
                id: session_id.to_string(),
                cell: cell.clone(),
            })
            .ok_or_else(|| ObserverError::not_found("session", session_id))
    }

    /// Like [`handle`](Self::handle), but brings a stored session into memory
    /// when it is not held yet.
    fn handle_or_load(&self, session_id: &str) -> Result<SessionHandle> {
        match self.handle(session_id) {
            Err(e) if e.is_not_found() => {
                let session = self
                    .store
                    .load_session(session_id)?
                    .ok_or_else(|| ObserverError::not_found("session", session_id))?;
                let mut sessions = self.sessions.write()?;
                let cell = sessions
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(SessionCell::new(session)))
                    .clone();
                Ok(SessionHandle {
                    id: session_id.to_string(),
                    cell,
                })
            }
            other => other,
        }
    }

    /// Returns a copy of a session with its records.
    ///
    /// Sessions not held in memory are loaded from the store.
    pub fn session(&self, session_id: &str) -> Result<Session> {
        match self.handle(session_id) {
            Ok(handle) => Ok(handle.cell.read()?.session.clone()),
            Err(e) if e.is_not_found() => self
                .store
                .load_session(session_id)?
                .ok_or_else(|| ObserverError::not_found("session", session_id)),
            Err(e) => Err(e),
        }
    }

    /// Summarises a session: duration, decision count, agents, outcomes.
    pub fn session_summary(&self, session_id: &str) -> Result<SessionSummary> {
        Ok(self.session(session_id)?.summary(Utc::now()))
    }

    /// Copies of all sessions held in memory, oldest first.
    pub fn sessions(&self) -> Result<Vec<Session>> {
        let mut sessions = self
            .cells()?
            .into_iter()
            .map(|cell| Ok(cell.read()?.session.clone()))
            .collect::<Result<Vec<_>>>()?;
        sessions.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    /// Takes a read-only copy of the records matching `filter`.
    ///
    /// Each session is copied under its read lock, so the copy never contains
    /// a record mid-construction. Records are ordered by session open time and
    /// then by insertion order.
    pub fn snapshot(&self, filter: &RecordFilter) -> Result<Vec<DecisionRecord>> {
        let mut records = Vec::new();
        for session in self.sessions()? {
            if !filter.admits_session(&session.id) {
                continue;
            }
            records.extend(session.records.into_iter().filter(|r| filter.matches(r)));
        }
        Ok(records)
    }

    /// Loads sessions the store still reports as open into memory.
    ///
    /// Used after a restart so that interrupted sessions can be appended to
    /// and closed. Sessions already in memory are left alone.
    ///
    /// # Returns
    ///
    /// The number of sessions recovered.
    pub fn recover_open_sessions(&self) -> Result<usize> {
        let open_ids = self.store.list_open_sessions()?;
        let mut recovered = 0;
        for id in open_ids {
            let Some(session) = self.store.load_session(&id)? else {
                continue;
            };
            let mut sessions = self.sessions.write()?;
            if let Entry::Vacant(slot) = sessions.entry(id.clone()) {
                slot.insert(Arc::new(SessionCell::new(session)));
                recovered += 1;
            }
        }
        if recovered > 0 {
            tracing::info!(recovered, "Recovered open sessions from store");
        }
        Ok(recovered)
    }

    /// Loads every stored session, open or closed, that is not yet held in
    /// memory. Afterwards `sessions` and `snapshot` cover the whole history.
    ///
    /// # Returns
    ///
    /// The number of sessions loaded.
    pub fn load_stored_sessions(&self) -> Result<usize> {
        let stored = self.store.list_sessions()?;
        let mut sessions = self.sessions.write()?;
        let mut loaded = 0;
        for session in stored {
            if let Entry::Vacant(slot) = sessions.entry(session.id.clone()) {
                slot.insert(Arc::new(SessionCell::new(session)));
                loaded += 1;
            }
        }
        tracing::debug!(loaded, "Loaded stored sessions");
        Ok(loaded)
    }

    fn cells(&self) -> Result<Vec<Arc<SessionCell>>> {
        Ok(self.sessions.read()?.values().cloned().collect())
    }
}

/// Next record timestamp: now, or just after the previous record if the clock
/// has not advanced.
fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(last) if now <= last => last + chrono::Duration::microseconds(1),
        _ => now,
    }
}
