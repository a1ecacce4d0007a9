//! Session domain model.
//!
//! A session groups the decisions made during one logical task or run.

use crate::analytics::OutcomeCounts;
use crate::decision::DecisionRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// An observation session and its ordered decision records.
///
/// Insertion order of `records` is temporal order. Records are appended only
/// while the session is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// Human-readable name, not required to be unique
    pub label: String,
    pub state: SessionState,
    pub opened_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub records: Vec<DecisionRecord>,
}

impl Session {
    /// Creates a new open session with no records.
    pub fn open(id: impl Into<String>, label: impl Into<String>, opened_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            state: SessionState::Open,
            opened_at,
            closed_at: None,
            records: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Timestamp of the most recent record, if any.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.records.last().map(|r| r.timestamp)
    }

    pub fn find_record(&self, record_id: &str) -> Option<&DecisionRecord> {
        self.records.iter().find(|r| r.id == record_id)
    }

    pub fn find_record_mut(&mut self, record_id: &str) -> Option<&mut DecisionRecord> {
        self.records.iter_mut().find(|r| r.id == record_id)
    }

    /// Summarises the session. Open sessions are measured up to `now`.
    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        let end = self.closed_at.unwrap_or(now);
        let duration_secs = (end - self.opened_at).num_milliseconds().max(0) as f64 / 1000.0;
        let agents: BTreeSet<&str> = self.records.iter().map(|r| r.agent_id.as_str()).collect();

        SessionSummary {
            id: self.id.clone(),
            label: self.label.clone(),
            state: self.state,
            opened_at: self.opened_at,
            closed_at: self.closed_at,
            duration_secs,
            decision_count: self.records.len(),
            agents: agents.into_iter().map(str::to_string).collect(),
            outcomes: OutcomeCounts::tally(&self.records),
            averages: SessionAverages::of(&self.records),
        }
    }
}

/// Mean response time and token usage over the records that reported them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionAverages {
    pub response_time_ms: Option<f64>,
    pub token_usage: Option<f64>,
}

impl SessionAverages {
    pub fn of(records: &[DecisionRecord]) -> Self {
        Self {
            response_time_ms: mean(records.iter().filter_map(|r| r.metadata.response_time_ms)),
            token_usage: mean(
                records
                    .iter()
                    .filter_map(|r| r.metadata.token_usage)
                    .map(|t| t as f64),
            ),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Per-session metrics: duration, decision count, participating agents,
/// outcome counts and measurement averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub label: String,
    pub state: SessionState,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub decision_count: usize,
    /// Distinct agent ids, sorted
    pub agents: Vec<String>,
    pub outcomes: OutcomeCounts,
    pub averages: SessionAverages,
}
