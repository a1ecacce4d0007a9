//! Success metrics.

use super::filter::{RecordFilter, working_set};
use crate::decision::{DecisionRecord, OutcomeStatus};
use crate::error::{ObserverError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Records counted by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub pending: usize,
    /// Records whose outcome was never reported
    pub unset: usize,
}

impl OutcomeCounts {
    pub fn tally<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a DecisionRecord>,
    {
        records.into_iter().fold(Self::default(), |mut counts, r| {
            counts.add(r);
            counts
        })
    }

    pub fn add(&mut self, record: &DecisionRecord) {
        self.total += 1;
        match record.outcome {
            Some(OutcomeStatus::Success) => self.successes += 1,
            Some(OutcomeStatus::Failure) => self.failures += 1,
            Some(OutcomeStatus::Pending) => self.pending += 1,
            None => self.unset += 1,
        }
    }

    pub fn terminal(&self) -> usize {
        self.successes + self.failures
    }

    pub fn success_rate(&self) -> SuccessRate {
        SuccessRate::from_counts(self.successes, self.failures)
    }
}

/// Share of terminal records that succeeded.
///
/// `NoData` means there were no terminal records at all, which is different
/// from a measured rate of zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuccessRate {
    NoData,
    Measured {
        successes: usize,
        failures: usize,
        rate: f64,
    },
}

impl SuccessRate {
    pub fn from_counts(successes: usize, failures: usize) -> Self {
        let terminal = successes + failures;
        if terminal == 0 {
            Self::NoData
        } else {
            Self::Measured {
                successes,
                failures,
                rate: successes as f64 / terminal as f64,
            }
        }
    }

    /// The rate in `[0, 1]`, or `None` without terminal data.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::NoData => None,
            Self::Measured { rate, .. } => Some(*rate),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    /// Converts `NoData` into an `InsufficientData` error for callers that
    /// cannot proceed without a number.
    pub fn require_data(&self) -> Result<f64> {
        self.value().ok_or_else(|| {
            ObserverError::InsufficientData("no records with a terminal outcome".to_string())
        })
    }
}

/// Successes divided by terminal (success or failure) records.
///
/// Pending and unreported records are excluded from both sides.
pub fn success_rate(records: &[DecisionRecord], filter: Option<&RecordFilter>) -> SuccessRate {
    OutcomeCounts::tally(working_set(records, filter)).success_rate()
}

/// Success rate per agent, keyed by agent id.
pub fn success_rate_by_agent(
    records: &[DecisionRecord],
    filter: Option<&RecordFilter>,
) -> BTreeMap<String, SuccessRate> {
    let mut counts: BTreeMap<String, OutcomeCounts> = BTreeMap::new();
    for record in working_set(records, filter) {
        counts.entry(record.agent_id.clone()).or_default().add(record);
    }
    counts
        .into_iter()
        .map(|(agent, c)| (agent, c.success_rate()))
        .collect()
}
