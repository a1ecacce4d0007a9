//! Decision pattern recognition.
//!
//! A pattern is a recurring pairing of a context shape with a chosen option.
//! The shape ignores values and keeps only keys and coarse value types, so
//! `{ticker: "ACME"}` and `{ticker: "INIT"}` fall into the same group.

use super::filter::{RecordFilter, working_set};
use super::success::{OutcomeCounts, SuccessRate};
use crate::decision::{DecisionContext, DecisionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Coarse type of a context value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Normalized signature of a context: sorted keys with their value kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextShape {
    pub fields: Vec<(String, ValueKind)>,
}

impl ContextShape {
    pub fn of(context: &DecisionContext) -> Self {
        let mut fields: Vec<(String, ValueKind)> = context
            .iter()
            .map(|(k, v)| (k.clone(), ValueKind::of(v)))
            .collect();
        fields.sort();
        Self { fields }
    }
}

impl fmt::Display for ContextShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, kind)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", key, kind.as_str())?;
        }
        f.write_str("}")
    }
}

/// Minimum frequency a pattern needs to be reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MinSupport {
    /// Absolute number of records.
    Count { value: usize },
    /// Share of the working record set, in `(0, 1]`.
    Ratio { value: f64 },
}

impl Default for MinSupport {
    fn default() -> Self {
        Self::Count { value: 2 }
    }
}

impl MinSupport {
    /// The minimum record count for a working set of `total` records. Never
    /// below one.
    pub fn threshold(&self, total: usize) -> usize {
        let raw = match *self {
            Self::Count { value } => value,
            Self::Ratio { value } => (value * total as f64).ceil() as usize,
        };
        raw.max(1)
    }
}

/// A recurring (context shape, chosen option) pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub shape: ContextShape,
    pub chosen: String,
    /// Number of records exhibiting the pattern
    pub support: usize,
    /// `support` as a share of the working record set
    pub ratio: f64,
    pub first_seen: DateTime<Utc>,
    pub first_record_id: String,
    pub outcomes: OutcomeCounts,
    pub success_rate: SuccessRate,
}

struct Accumulator {
    first_index: usize,
    first_seen: DateTime<Utc>,
    first_record_id: String,
    outcomes: OutcomeCounts,
}

/// Finds patterns whose support meets `min_support`.
///
/// Patterns are ordered by support, highest first. Ties go to the pattern
/// that occurred first in chronological order, so the same input always
/// yields the same sequence.
pub fn detect_patterns(
    records: &[DecisionRecord],
    min_support: MinSupport,
    filter: Option<&RecordFilter>,
) -> Vec<Pattern> {
    let selected = working_set(records, filter);
    let total = selected.len();
    if total == 0 {
        return Vec::new();
    }
    let threshold = min_support.threshold(total);

    let mut groups: HashMap<(ContextShape, String), Accumulator> = HashMap::new();
    for (index, record) in selected.iter().enumerate() {
        groups
            .entry((ContextShape::of(&record.context), record.chosen.clone()))
            .or_insert_with(|| Accumulator {
                first_index: index,
                first_seen: record.timestamp,
                first_record_id: record.id.clone(),
                outcomes: OutcomeCounts::default(),
            })
            .outcomes
            .add(record);
    }

    let mut found: Vec<(usize, Pattern)> = groups
        .into_iter()
        .filter(|(_, acc)| acc.outcomes.total >= threshold)
        .map(|((shape, chosen), acc)| {
            let pattern = Pattern {
                shape,
                chosen,
                support: acc.outcomes.total,
                ratio: acc.outcomes.total as f64 / total as f64,
                first_seen: acc.first_seen,
                first_record_id: acc.first_record_id,
                outcomes: acc.outcomes,
                success_rate: acc.outcomes.success_rate(),
            };
            (acc.first_index, pattern)
        })
        .collect();

    found.sort_by(|(ia, a), (ib, b)| b.support.cmp(&a.support).then(ia.cmp(ib)));
    found.into_iter().map(|(_, p)| p).collect()
}
