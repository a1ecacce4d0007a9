//! Adapter for multi-agent coordinators.
//!
//! A swarm run is a trace of sub-agent proposals followed by the
//! coordinator's pick:
//!
//! ```json
//! {
//!   "execution_path": [
//!     {"agent": "researcher", "action": "gather data", "reasoning": "...", "confidence": 0.8,
//!      "considered_actions": [{"name": "skip", "feasibility_score": 3}]},
//!     {"agent": "planner", "action": "draft plan", "reasoning": "...", "confidence": 0.6}
//!   ],
//!   "result": "draft plan",
//!   "confidence": 0.7,
//!   "reasoning": "plan covers the gaps"
//! }
//! ```
//!
//! The trace collapses into one draft: every step's `action` becomes an
//! option weighted by the step's confidence, `result` is the choice, and the
//! reasoning holds one segment per step (labelled by agent) followed by the
//! coordinator's segment.
//!
//! Actions a sub-agent considered but did not propose follow the proposals
//! as options weighted by feasibility. Each step's considered actions and
//! `data` are also kept as a structured step, and the coordinator's
//! `metrics` become the record's metadata.

use crate::value;
use observer_core::adapter::DecisionAdapter;
use observer_core::decision::{
    DecisionDraft, DecisionOption, DecisionStep, ReasoningSegment, join_reasoning,
};
use observer_core::error::{ObserverError, Result};
use serde_json::Value;

const NAME: &str = "swarm";

/// Label of the coordinator's reasoning segment.
pub const COORDINATOR_LABEL: &str = "coordinator";

/// Step confidence assumed when a sub-agent reports none.
const DEFAULT_STEP_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct SwarmAdapter;

impl SwarmAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl DecisionAdapter for SwarmAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn normalize(&self, agent_id: &str, raw: &Value) -> Result<DecisionDraft> {
        let Some(path) = raw.get("execution_path") else {
            return Err(ObserverError::unknown_input("no execution_path"));
        };
        let steps = path
            .as_array()
            .ok_or_else(|| ObserverError::unsupported_format(NAME, "execution_path is not a list"))?;

        let mut options = Vec::new();
        let mut segments = Vec::new();
        let mut structured: Vec<DecisionStep> = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            let action = value::text_field(step, "action").ok_or_else(|| {
                ObserverError::unsupported_format(NAME, format!("step {} has no action", index))
            })?;
            let weight = step
                .get("confidence")
                .and_then(value::score)
                .unwrap_or(DEFAULT_STEP_CONFIDENCE);
            if !weight.is_finite() {
                return Err(ObserverError::unsupported_format(
                    NAME,
                    format!("step {} confidence is not a number", index),
                ));
            }
            value::push_unique(&mut options, DecisionOption::weighted(action, weight));

            let label = value::text_field(step, "agent").unwrap_or_else(|| format!("step-{}", index));
            if let Some(text) = value::text_field(step, "reasoning") {
                segments.push(ReasoningSegment::new(label.as_str(), text));
            }
            let detail = value::step(label, step);
            if !detail.evidence.is_empty() || !detail.alternatives.is_empty() {
                structured.push(detail);
            }
        }
        for alt in structured.iter().flat_map(|step| &step.alternatives) {
            value::push_unique(&mut options, value::alternative_option(alt));
        }

        let chosen = value::text_field(raw, "result")
            .ok_or_else(|| ObserverError::unsupported_format(NAME, "result is missing"))?;
        if let Some(reasoning) = raw.get("reasoning") {
            let coordinator = value::reasoning_segments(COORDINATOR_LABEL, reasoning);
            if !coordinator.is_empty() {
                let text = if coordinator.len() == 1 {
                    coordinator[0].text.clone()
                } else {
                    coordinator
                        .iter()
                        .map(|s| format!("{}: {}", s.label, s.text))
                        .collect::<Vec<_>>()
                        .join("; ")
                };
                segments.push(ReasoningSegment::new(COORDINATOR_LABEL, text));
            }
        }

        let mut draft = DecisionDraft::new(agent_id, chosen.as_str());
        match value::resolve_choice(&options, &chosen) {
            Some(label) => draft.chosen = label,
            None => draft = draft.outside_options(),
        }
        draft.options = options;
        draft.reasoning = join_reasoning(&segments);
        draft.confidence = value::confidence(NAME, raw, "confidence")?;
        draft.context = value::context(raw);
        draft.task = value::text_field(raw, "task");
        draft.steps = structured;
        draft.dependencies = value::dependencies(raw);
        draft.metadata = match raw.get("metrics") {
            Some(_) => value::metadata(raw, "metrics"),
            None => value::metadata(raw, "metadata"),
        };
        Ok(draft)
    }
}
