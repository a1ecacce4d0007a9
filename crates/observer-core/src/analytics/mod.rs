//! Analytics over recorded decisions.
//!
//! Every function here is pure: it works on a read-only slice of records
//! (typically a snapshot taken from the session manager) and never mutates it.
//! Empty input yields the "no data" or empty forms rather than an error.
//!
//! - `filter`: restricting the working record set
//! - `success`: success rates and outcome counts
//! - `trend`: time-bucketed success rates
//! - `patterns`: recurring context-shape / choice pairings
//! - `snapshot`: the engine and its aggregate `MetricSnapshot`

mod filter;
mod patterns;
mod snapshot;
mod success;
mod trend;


pub use filter::RecordFilter;
pub use patterns::{ContextShape, MinSupport, Pattern, ValueKind, detect_patterns};
pub use snapshot::{AnalyticsEngine, MetricSnapshot};
pub use success::{OutcomeCounts, SuccessRate, success_rate, success_rate_by_agent};
pub use trend::{BucketWidth, MAX_TREND_BUCKETS, TrendBucket, trend};
