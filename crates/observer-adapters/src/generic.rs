//! Adapter for simple agents.
//!
//! Accepts either a bare string (a direct response) or an object carrying a
//! `decision`:
//!
//! ```json
//! {
//!   "decision": "hold",
//!   "options": ["buy", "hold", {"label": "sell", "weight": 0.2}],
//!   "confidence": 0.6,
//!   "reasoning": "volume is flat",
//!   "steps": [{"thought": "check volume", "reasoning": "flat", "supporting_evidence": {"volume": 1200}}],
//!   "context": {"ticker": "ACME"},
//!   "task": "trade ACME",
//!   "dependencies": ["<earlier record id>"],
//!   "metadata": {"response_time": 0.8, "token_usage": 350}
//! }
//! ```

use crate::value;
use observer_core::adapter::DecisionAdapter;
use observer_core::decision::{DecisionDraft, DecisionOption, ReasoningSegment, join_reasoning};
use observer_core::error::{ObserverError, Result};
use serde_json::Value;

const NAME: &str = "generic";

/// Confidence assumed for a bare-string response.
const DIRECT_RESPONSE_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct GenericAdapter;

impl GenericAdapter {
    pub fn new() -> Self {
        Self
    }

    fn direct_response(agent_id: &str, response: &str) -> Result<DecisionDraft> {
        let response = response.trim();
        if response.is_empty() {
            return Err(ObserverError::unsupported_format(NAME, "response is empty"));
        }
        let reasoning = join_reasoning(&[ReasoningSegment::new("Direct Response", response)]);
        Ok(DecisionDraft::new(agent_id, response)
            .with_options([response])
            .with_reasoning(reasoning)
            .with_confidence(DIRECT_RESPONSE_CONFIDENCE))
    }

    fn option(entry: &Value) -> Option<DecisionOption> {
        match entry {
            Value::Object(_) => {
                let label = ["label", "name", "approach"]
                    .iter()
                    .find_map(|k| value::text_field(entry, k))?;
                let weight = ["weight", "score"]
                    .iter()
                    .find_map(|k| entry.get(*k).and_then(value::score));
                Some(DecisionOption {
                    label,
                    weight: weight.filter(|w| w.is_finite()),
                })
            }
            other => value::text(other).map(DecisionOption::new),
        }
    }
}

impl DecisionAdapter for GenericAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn normalize(&self, agent_id: &str, raw: &Value) -> Result<DecisionDraft> {
        let object = match raw {
            Value::String(s) => return Self::direct_response(agent_id, s),
            Value::Object(_) => raw,
            _ => {
                return Err(ObserverError::unknown_input(
                    "generic adapter expects a string or an object",
                ));
            }
        };

        let Some(decision) = object.get("decision") else {
            if ["steps", "options", "alternatives"]
                .iter()
                .any(|k| object.get(*k).is_some())
            {
                return Err(ObserverError::unsupported_format(
                    NAME,
                    "output has no decision field",
                ));
            }
            return Err(ObserverError::unknown_input("object has no decision field"));
        };
        let chosen = value::text(decision)
            .ok_or_else(|| ObserverError::unsupported_format(NAME, "decision is empty"))?;

        let mut options = Vec::new();
        for entry in value::array(object, "options")
            .iter()
            .chain(value::array(object, "alternatives"))
        {
            let option = Self::option(entry).ok_or_else(|| {
                ObserverError::unsupported_format(NAME, format!("unreadable option: {}", entry))
            })?;
            value::push_unique(&mut options, option);
        }

        let mut draft = DecisionDraft::new(agent_id, chosen.as_str());
        match value::resolve_choice(&options, &chosen) {
            Some(label) => draft.chosen = label,
            None if options.is_empty() => options.push(DecisionOption::new(chosen.as_str())),
            None => draft = draft.outside_options(),
        }
        draft.options = options;

        let mut segments: Vec<ReasoningSegment> = value::array(object, "steps")
            .iter()
            .filter_map(|step| {
                let label = value::text_field(step, "thought").unwrap_or_default();
                let text = value::text_field(step, "reasoning")?;
                Some(ReasoningSegment::new(label, text))
            })
            .collect();
        if let Some(reasoning) = object.get("reasoning") {
            segments.extend(value::reasoning_segments("reasoning", reasoning));
        }
        draft.reasoning = join_reasoning(&segments);

        draft.confidence = value::confidence(NAME, object, "confidence")?;
        draft.context = value::context(object);
        draft.task = value::text_field(object, "task");
        draft.steps = value::array(object, "steps")
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let label = value::text_field(step, "thought").unwrap_or_else(|| format!("step-{}", index));
                value::step(label, step)
            })
            .filter(|step| !step.is_bare())
            .collect();
        draft.dependencies = value::dependencies(object);
        draft.metadata = value::metadata(object, "metadata");
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use observer_core::decision::split_reasoning;
    use serde_json::json;

    #[test]
    fn test_bare_string_is_a_direct_response() {
        let draft = GenericAdapter.normalize("simple", &json!("Buy more ACME")).unwrap();
        assert_eq!(draft.chosen, "Buy more ACME");
        assert_eq!(draft.options.len(), 1);
        assert_eq!(draft.confidence, Some(0.5));
        let segments = split_reasoning(&draft.reasoning);
        assert_eq!(segments[0].label, "Direct Response");
        draft.validate().unwrap();
    }

    #[test]
    fn test_decision_with_options() {
        let raw = json!({
            "decision": "HOLD",
            "options": ["buy", "hold", {"label": "sell", "weight": 0.2}],
            "confidence": "LOW",
            "reasoning": "flat volume",
            "context": {"ticker": "ACME"}
        });
        let draft = GenericAdapter.normalize("simple", &raw).unwrap();
        assert_eq!(draft.chosen, "hold");
        assert_eq!(draft.options[2].weight, Some(0.2));
        assert_eq!(draft.confidence, Some(0.25));
        assert!(!draft.outside_options);
        assert_eq!(draft.context["ticker"], "ACME");
        draft.validate().unwrap();
    }

    #[test]
    fn test_dependencies_metadata_and_evidence() {
        let raw = json!({
            "decision": "sell",
            "options": ["buy", "sell"],
            "steps": [
                {"thought": "check volume", "reasoning": "flat"},
                {"thought": "check news", "reasoning": "lawsuit", "supporting_evidence": {"source": "wire"}}
            ],
            "dependencies": ["r-1", "  ", "r-2"],
            "metadata": {"response_time": 0.5, "token_usage": 120}
        });
        let draft = GenericAdapter.normalize("simple", &raw).unwrap();
        assert_eq!(draft.dependencies, vec!["r-1", "r-2"]);
        assert_eq!(draft.metadata.response_time_ms, Some(500.0));
        assert_eq!(draft.metadata.token_usage, Some(120));
        assert_eq!(draft.steps.len(), 1);
        assert_eq!(draft.steps[0].label, "check news");
        assert_eq!(draft.steps[0].evidence["source"], "wire");
        draft.validate().unwrap();
    }

    #[test]
    fn test_decision_without_options_becomes_single_option() {
        let draft = GenericAdapter
            .normalize("simple", &json!({"decision": "wait"}))
            .unwrap();
        assert_eq!(draft.options, vec![DecisionOption::new("wait")]);
        assert!(!draft.outside_options);
    }

    #[test]
    fn test_decision_outside_options_is_flagged() {
        let raw = json!({"decision": "short", "options": ["buy", "sell"]});
        let draft = GenericAdapter.normalize("simple", &raw).unwrap();
        assert!(draft.outside_options);
        draft.validate().unwrap();
    }

    #[test]
    fn test_missing_decision() {
        let err = GenericAdapter
            .normalize("simple", &json!({"options": ["a", "b"]}))
            .unwrap_err();
        assert!(err.is_unsupported_format());

        let err = GenericAdapter
            .normalize("simple", &json!({"decision": null, "steps": []}))
            .unwrap_err();
        assert!(err.is_unsupported_format());

        let err = GenericAdapter.normalize("simple", &json!({"foo": 1})).unwrap_err();
        assert!(err.is_unknown_input());

        let err = GenericAdapter.normalize("simple", &json!(42)).unwrap_err();
        assert!(err.is_unknown_input());
    }
}
