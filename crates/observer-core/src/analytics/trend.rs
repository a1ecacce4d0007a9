//! Time-bucketed success trends.

use super::filter::{RecordFilter, working_set};
use super::success::{OutcomeCounts, SuccessRate};
use crate::decision::DecisionRecord;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on the number of duration buckets in one trend.
pub const MAX_TREND_BUCKETS: usize = 10_000;

/// Width of a trend bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketWidth {
    /// Fixed wall-clock width, aligned to multiples of the width since the epoch.
    Duration { seconds: u64 },
    /// Fixed number of consecutive records.
    Count { size: usize },
}

impl Default for BucketWidth {
    fn default() -> Self {
        Self::Duration { seconds: 3600 }
    }
}

/// One bucket of a trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBucket {
    /// Position in the timeline, starting at zero
    pub index: usize,
    /// Inclusive start. For count buckets, the first record's timestamp.
    pub start: DateTime<Utc>,
    /// Exclusive end for duration buckets; the last record's timestamp for
    /// count buckets.
    pub end: DateTime<Utc>,
    pub outcomes: OutcomeCounts,
    pub success_rate: SuccessRate,
}

/// Partitions records into buckets and computes the success rate of each.
///
/// Buckets come back in chronological order. Duration buckets form a
/// contiguous timeline from the first to the last record: a bucket without
/// terminal records (or without any records) is kept and reports
/// `SuccessRate::NoData`. Zero widths are treated as one.
///
/// A duration width that would need more than [`MAX_TREND_BUCKETS`] buckets
/// to cover the records is widened to the smallest multiple of itself that
/// fits; the buckets' `start` and `end` show the width actually used.
pub fn trend(
    records: &[DecisionRecord],
    width: BucketWidth,
    filter: Option<&RecordFilter>,
) -> Vec<TrendBucket> {
    let selected = working_set(records, filter);
    if selected.is_empty() {
        return Vec::new();
    }
    match width {
        BucketWidth::Duration { seconds } => by_duration(&selected, seconds.max(1)),
        BucketWidth::Count { size } => by_count(&selected, size.max(1)),
    }
}

/// Widens `width_ms` by the smallest factor that covers `span_ms` with at
/// most [`MAX_TREND_BUCKETS`] aligned buckets.
fn fitted_width(width_ms: i64, span_ms: i64) -> i64 {
    let limit = MAX_TREND_BUCKETS as i64 - 1;
    let factor = span_ms / width_ms.saturating_mul(limit) + 1;
    if factor > 1 {
        tracing::debug!(
            requested_ms = width_ms,
            factor,
            "Widening trend buckets to stay within the bucket limit"
        );
    }
    width_ms.saturating_mul(factor)
}

fn by_duration(records: &[&DecisionRecord], seconds: u64) -> Vec<TrendBucket> {
    let requested_ms = i64::try_from(seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
    let millis = |r: &DecisionRecord| r.timestamp.timestamp_millis();

    // Sorted input: first and last bound the timeline.
    let first = millis(records[0]);
    let last = millis(records[records.len() - 1]);
    let width_ms = fitted_width(requested_ms, last - first);
    let origin = first.div_euclid(width_ms) * width_ms;
    let bucket_count = ((last - origin) / width_ms) as usize + 1;

    let mut counts = vec![OutcomeCounts::default(); bucket_count];
    for record in records {
        let index = ((millis(*record) - origin) / width_ms) as usize;
        counts[index].add(*record);
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(index, outcomes)| {
            let start_ms = origin + index as i64 * width_ms;
            let start = DateTime::<Utc>::from_timestamp_millis(start_ms).unwrap_or_default();
            TrendBucket {
                index,
                start,
                end: start
                    .checked_add_signed(Duration::milliseconds(width_ms))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
                outcomes,
                success_rate: outcomes.success_rate(),
            }
        })
        .collect()
}

fn by_count(records: &[&DecisionRecord], size: usize) -> Vec<TrendBucket> {
    records
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| {
            let outcomes = OutcomeCounts::tally(chunk.iter().copied());
            TrendBucket {
                index,
                start: chunk[0].timestamp,
                end: chunk[chunk.len() - 1].timestamp,
                outcomes,
                success_rate: outcomes.success_rate(),
            }
        })
        .collect()
}
