//! Decision domain module.
//!
//! - `model`: the canonical decision record and the draft adapters produce
//! - `reasoning`: stable encoding of multi-part reasoning

mod model;
mod reasoning;

pub use model::{
    ConfidenceLevel, ConsideredAlternative, DecisionContext, DecisionDraft, DecisionMetadata,
    DecisionOption, DecisionRecord, DecisionStep, OutcomeStatus, OutcomeUpdate,
    PerformanceMetrics,
};
pub use reasoning::{
    LABEL_SEPARATOR, ReasoningSegment, SEGMENT_SEPARATOR, join_reasoning, split_reasoning,
};
