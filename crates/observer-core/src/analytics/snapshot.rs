//! Aggregate metric snapshots.

use super::filter::{RecordFilter, working_set};
use super::patterns::{MinSupport, Pattern, detect_patterns};
use super::success::{OutcomeCounts, SuccessRate, success_rate, success_rate_by_agent};
use super::trend::{BucketWidth, TrendBucket, trend};
use crate::config::AnalyticsConfig;
use crate::decision::DecisionRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Derived metrics over a record set. Always recomputed, never stored as
/// authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub generated_at: DateTime<Utc>,
    /// Timestamp of the earliest record considered
    pub window_start: Option<DateTime<Utc>>,
    /// Timestamp of the latest record considered
    pub window_end: Option<DateTime<Utc>>,
    pub session_count: usize,
    pub outcomes: OutcomeCounts,
    pub success_rate: SuccessRate,
    pub by_agent: BTreeMap<String, SuccessRate>,
    /// Decisions that fell outside their agent's enumerated options
    pub outside_option_count: usize,
    pub bucket_width: BucketWidth,
    pub trend: Vec<TrendBucket>,
    pub min_support: MinSupport,
    pub patterns: Vec<Pattern>,
}

/// Pure analytics over immutable record snapshots.
///
/// The engine holds only its configuration; it never mutates the records it
/// is given.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn success_rate(
        &self,
        records: &[DecisionRecord],
        filter: Option<&RecordFilter>,
    ) -> SuccessRate {
        success_rate(records, filter)
    }

    /// Trend with the configured bucket width.
    pub fn trend(
        &self,
        records: &[DecisionRecord],
        filter: Option<&RecordFilter>,
    ) -> Vec<TrendBucket> {
        trend(records, self.config.trend_bucket, filter)
    }

    /// Patterns with the configured minimum support.
    pub fn patterns(
        &self,
        records: &[DecisionRecord],
        filter: Option<&RecordFilter>,
    ) -> Vec<Pattern> {
        detect_patterns(records, self.config.min_support, filter)
    }

    /// Computes every metric over the filtered record set.
    pub fn snapshot(
        &self,
        records: &[DecisionRecord],
        filter: Option<&RecordFilter>,
    ) -> MetricSnapshot {
        let selected = working_set(records, filter);
        let sessions: BTreeSet<&str> = selected.iter().map(|r| r.session_id.as_str()).collect();
        let outcomes = OutcomeCounts::tally(selected.iter().copied());

        MetricSnapshot {
            generated_at: Utc::now(),
            window_start: selected.first().map(|r| r.timestamp),
            window_end: selected.last().map(|r| r.timestamp),
            session_count: sessions.len(),
            outcomes,
            success_rate: outcomes.success_rate(),
            by_agent: success_rate_by_agent(records, filter),
            outside_option_count: selected.iter().filter(|r| r.outside_options).count(),
            bucket_width: self.config.trend_bucket,
            trend: self.trend(records, filter),
            min_support: self.config.min_support,
            patterns: self.patterns(records, filter),
        }
    }
}
