//! Record filters.

use crate::decision::DecisionRecord;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&DecisionRecord) -> bool + Send + Sync>;

/// Restricts the working record set of an analytics operation.
///
/// All configured criteria must hold for a record to match. The default
/// filter matches everything. Filtering never touches the records themselves.
///
/// # Examples
///
/// ```
/// use observer_core::analytics::RecordFilter;
///
/// let filter = RecordFilter::default()
///     .session("s-1")
///     .agent("planner")
///     .with_context_key("ticker");
/// assert!(filter.admits_session("s-1"));
/// assert!(!filter.admits_session("s-2"));
/// ```
#[derive(Clone, Default)]
pub struct RecordFilter {
    sessions: Option<BTreeSet<String>>,
    agents: Option<BTreeSet<String>>,
    from: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    context_keys: Vec<String>,
    predicate: Option<Predicate>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session to the set of admitted sessions.
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.sessions
            .get_or_insert_with(BTreeSet::new)
            .insert(session_id.into());
        self
    }

    pub fn sessions<I, S>(self, session_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        session_ids.into_iter().fold(self, |f, id| f.session(id))
    }

    /// Adds an agent to the set of admitted agents.
    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agents
            .get_or_insert_with(BTreeSet::new)
            .insert(agent_id.into());
        self
    }

    /// Admits records at or after `from`.
    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Admits records strictly before `until`.
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Requires the record's context to contain `key`.
    pub fn with_context_key(mut self, key: impl Into<String>) -> Self {
        self.context_keys.push(key.into());
        self
    }

    /// Adds an arbitrary predicate.
    pub fn matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&DecisionRecord) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Cheap pre-check used to skip whole sessions.
    pub fn admits_session(&self, session_id: &str) -> bool {
        self.sessions
            .as_ref()
            .is_none_or(|ids| ids.contains(session_id))
    }

    pub fn matches(&self, record: &DecisionRecord) -> bool {
        self.admits_session(&record.session_id)
            && self
                .agents
                .as_ref()
                .is_none_or(|ids| ids.contains(&record.agent_id))
            && self.from.is_none_or(|from| record.timestamp >= from)
            && self.until.is_none_or(|until| record.timestamp < until)
            && self
                .context_keys
                .iter()
                .all(|k| record.context.contains_key(k))
            && self.predicate.as_ref().is_none_or(|p| p(record))
    }
}

impl fmt::Debug for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordFilter")
            .field("sessions", &self.sessions)
            .field("agents", &self.agents)
            .field("from", &self.from)
            .field("until", &self.until)
            .field("context_keys", &self.context_keys)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Applies an optional filter and orders the result chronologically.
///
/// The sort is stable, so records with equal timestamps keep their input order.
pub(crate) fn working_set<'a>(
    records: &'a [DecisionRecord],
    filter: Option<&RecordFilter>,
) -> Vec<&'a DecisionRecord> {
    let mut selected: Vec<&DecisionRecord> = records
        .iter()
        .filter(|r| filter.is_none_or(|f| f.matches(r)))
        .collect();
    selected.sort_by_key(|r| r.timestamp);
    selected
}
