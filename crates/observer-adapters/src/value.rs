//! Readers shared by the adapters.
//!
//! Raw agent output is loosely typed, so these helpers accept the handful of
//! representations agents actually emit and return `None` for anything else.

use crate::enhanced::parse_feasibility;
use observer_core::decision::{
    ConfidenceLevel, ConsideredAlternative, DecisionContext, DecisionMetadata, DecisionOption,
    DecisionStep, ReasoningSegment,
};
use observer_core::error::{ObserverError, Result};
use serde_json::Value;

/// Reads a value as trimmed, non-empty text. Numbers and booleans are
/// rendered; containers and null are not text.
pub(crate) fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

pub(crate) fn text_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(text)
}

/// Reads a score from a number, a numeric string or a LOW/MEDIUM/HIGH label.
pub(crate) fn score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(
                    s.parse::<f64>()
                        .unwrap_or_else(|_| ConfidenceLevel::from_label(s).score()),
                )
            }
        }
        _ => None,
    }
}

/// Reads an optional confidence, rejecting values outside `[0, 1]`.
pub(crate) fn confidence(adapter: &str, raw: &Value, key: &str) -> Result<Option<f64>> {
    match raw.get(key).and_then(score) {
        Some(c) if !(0.0..=1.0).contains(&c) => Err(ObserverError::unsupported_format(
            adapter,
            format!("{} {} is outside [0, 1]", key, c),
        )),
        other => Ok(other),
    }
}

pub(crate) fn context(raw: &Value) -> DecisionContext {
    raw.get("context")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

pub(crate) fn array<'a>(raw: &'a Value, key: &str) -> &'a [Value] {
    raw.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Flattens a reasoning value into segments.
///
/// Text becomes one segment under `label`; an object becomes one segment
/// per entry, labelled by key, in the object's key order.
pub(crate) fn reasoning_segments(label: &str, value: &Value) -> Vec<ReasoningSegment> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| {
                let body = text(v).or_else(|| nested(v))?;
                Some(ReasoningSegment::new(k.as_str(), body))
            })
            .collect(),
        other => text(other)
            .or_else(|| nested(other))
            .map(|t| vec![ReasoningSegment::new(label, t)])
            .unwrap_or_default(),
    }
}

fn nested(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) if !items.is_empty() => Some(value.to_string()),
        Value::Object(map) if !map.is_empty() => Some(value.to_string()),
        _ => None,
    }
}

/// Adds an option unless an option with the same label is already present.
///
/// Agents often propose the same action more than once; the first proposal
/// keeps its weight.
pub(crate) fn push_unique(options: &mut Vec<DecisionOption>, option: DecisionOption) {
    if options.iter().any(|o| o.label == option.label) {
        tracing::debug!(label = %option.label, "Dropping repeated option");
        return;
    }
    options.push(option);
}

/// Matches a chosen value against the options, ignoring case and
/// surrounding whitespace. Returns the option's canonical label.
pub(crate) fn resolve_choice(options: &[DecisionOption], chosen: &str) -> Option<String> {
    let wanted = chosen.trim();
    options
        .iter()
        .find(|o| o.label == wanted)
        .or_else(|| {
            options
                .iter()
                .find(|o| o.label.eq_ignore_ascii_case(wanted))
        })
        .map(|o| o.label.clone())
}

/// Feasibility assumed when an alternative carries no readable rating.
pub(crate) const DEFAULT_FEASIBILITY: f64 = 5.0;

/// Feasibility ratings are on a one-to-ten scale.
pub(crate) const FEASIBILITY_SCALE: f64 = 10.0;

fn texts(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(text).collect(),
        Some(other) => text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn first<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| raw.get(*k).filter(|v| !v.is_null()))
}

/// Reads an alternative in either of the shapes agents use:
/// `{approach, advantages, disadvantages, feasibility}` or
/// `{name, pros, cons, feasibility_score}`.
pub(crate) fn alternative(entry: &Value) -> Option<ConsideredAlternative> {
    let approach = first(entry, &["approach", "name"]).and_then(text)?;
    let feasibility = match first(entry, &["feasibility", "feasibility_score"]) {
        Some(Value::String(s)) => Some(parse_feasibility(s)),
        Some(v) => score(v),
        None => None,
    }
    .filter(|f| f.is_finite() && *f >= 0.0)
    .unwrap_or(DEFAULT_FEASIBILITY);
    Some(ConsideredAlternative {
        approach,
        advantages: texts(first(entry, &["advantages", "pros"])),
        disadvantages: texts(first(entry, &["disadvantages", "cons"])),
        feasibility: Some(feasibility),
    })
}

/// Reads the structured part of a reasoning step: its confidence, the
/// evidence it cites and the alternatives it weighed. The step's prose goes
/// into the record's reasoning instead.
///
/// Evidence is `supporting_evidence` (an object) plus `data` when present.
/// Confidences outside `[0, 1]` are dropped.
pub(crate) fn step(label: String, raw: &Value) -> DecisionStep {
    let mut step = DecisionStep::new(label);
    step.confidence = raw
        .get("confidence")
        .and_then(score)
        .filter(|c| (0.0..=1.0).contains(c));
    match raw.get("supporting_evidence") {
        Some(Value::Object(map)) => step.evidence.extend(map.clone()),
        Some(Value::Null) | None => {}
        Some(other) => {
            step.evidence.insert("supporting_evidence".to_string(), other.clone());
        }
    }
    if let Some(data) = raw.get("data").filter(|v| !v.is_null()) {
        step.evidence.insert("data".to_string(), data.clone());
    }
    step.alternatives = array(raw, "alternatives_considered")
        .iter()
        .chain(array(raw, "considered_actions"))
        .filter_map(alternative)
        .collect();
    step
}

/// The option an alternative stands for, weighted by its feasibility.
pub(crate) fn alternative_option(alt: &ConsideredAlternative) -> DecisionOption {
    let feasibility = alt.feasibility.unwrap_or(DEFAULT_FEASIBILITY);
    DecisionOption::weighted(alt.approach.as_str(), feasibility / FEASIBILITY_SCALE)
}

/// Reads measurements from the object under `key`.
///
/// `response_time_ms` is taken as is; `response_time` is in seconds. Entries
/// that are not measurements, or that cannot be read as one, stay in
/// `extra`.
pub(crate) fn metadata(raw: &Value, key: &str) -> DecisionMetadata {
    let Some(map) = raw.get(key).and_then(Value::as_object) else {
        return DecisionMetadata::default();
    };
    let mut extra = map.clone();
    let mut metadata = DecisionMetadata::default();

    if let Some(ms) = map.get("response_time_ms").and_then(Value::as_f64) {
        metadata.response_time_ms = Some(ms);
        extra.remove("response_time_ms");
    } else if let Some(secs) = map.get("response_time").and_then(Value::as_f64) {
        metadata.response_time_ms = Some(secs * 1000.0);
        extra.remove("response_time");
    }
    if let Some(tokens) = map.get("token_usage").and_then(Value::as_u64) {
        metadata.token_usage = Some(tokens);
        extra.remove("token_usage");
    }
    metadata.extra = extra;
    metadata
}

/// Reads `dependencies` as a list of record ids; blank entries are dropped.
pub(crate) fn dependencies(raw: &Value) -> Vec<String> {
    array(raw, "dependencies").iter().filter_map(text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_accepts_scalars_only() {
        assert_eq!(text(&json!("  hold ")), Some("hold".to_string()));
        assert_eq!(text(&json!(3)), Some("3".to_string()));
        assert_eq!(text(&json!("   ")), None);
        assert_eq!(text(&json!(null)), None);
        assert_eq!(text(&json!({"a": 1})), None);
    }

    #[test]
    fn test_score_reads_labels() {
        assert_eq!(score(&json!(0.7)), Some(0.7));
        assert_eq!(score(&json!("0.3")), Some(0.3));
        assert_eq!(score(&json!("HIGH")), Some(0.85));
        assert_eq!(score(&json!("whatever")), Some(0.5));
        assert_eq!(score(&json!([])), None);
    }

    #[test]
    fn test_confidence_range() {
        let raw = json!({"confidence": 1.5});
        assert!(confidence("test", &raw, "confidence").unwrap_err().is_unsupported_format());
        assert_eq!(confidence("test", &json!({}), "confidence").unwrap(), None);
    }

    #[test]
    fn test_reasoning_segments_from_object() {
        let segments = reasoning_segments("x", &json!({"b": "second", "a": "first", "c": null}));
        let labels: Vec<&str> = segments.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&"a") && labels.contains(&"b"));
    }

    #[test]
    fn test_alternative_shapes() {
        let swarm = alternative(&json!({"name": "wait", "pros": ["cheap"], "cons": "slow", "feasibility_score": 3}))
            .unwrap();
        assert_eq!(swarm.approach, "wait");
        assert_eq!(swarm.advantages, vec!["cheap"]);
        assert_eq!(swarm.disadvantages, vec!["slow"]);
        assert_eq!(swarm.feasibility, Some(3.0));

        let enhanced = alternative(&json!({"approach": "Invest", "feasibility": "7/10"})).unwrap();
        assert_eq!(enhanced.feasibility, Some(7.0));
        assert!(enhanced.advantages.is_empty());

        assert_eq!(alternative(&json!({"name": "x"})).unwrap().feasibility, Some(5.0));
        assert!(alternative(&json!({"pros": ["orphan"]})).is_none());
    }

    #[test]
    fn test_step_collects_evidence_and_alternatives() {
        let raw = json!({
            "confidence": "HIGH",
            "supporting_evidence": {"revenue": "up 12%"},
            "data": [1, 2, 3],
            "considered_actions": [{"name": "wait"}]
        });
        let step = step("analyst".to_string(), &raw);
        assert_eq!(step.confidence, Some(0.85));
        assert_eq!(step.evidence["revenue"], "up 12%");
        assert_eq!(step.evidence["data"], json!([1, 2, 3]));
        assert_eq!(step.alternatives.len(), 1);

        let out_of_range = super::step("x".to_string(), &json!({"confidence": 7}));
        assert_eq!(out_of_range.confidence, None);
        assert!(out_of_range.is_bare());
    }

    #[test]
    fn test_metadata_units() {
        let seconds = metadata(&json!({"metadata": {"response_time": 1.5, "token_usage": 420, "model": "m"}}), "metadata");
        assert_eq!(seconds.response_time_ms, Some(1500.0));
        assert_eq!(seconds.token_usage, Some(420));
        assert_eq!(seconds.extra.len(), 1);

        let millis = metadata(&json!({"metrics": {"response_time_ms": 80}}), "metrics");
        assert_eq!(millis.response_time_ms, Some(80.0));

        let unreadable = metadata(&json!({"metadata": {"token_usage": "lots"}}), "metadata");
        assert_eq!(unreadable.token_usage, None);
        assert_eq!(unreadable.extra["token_usage"], "lots");
        assert!(metadata(&json!({}), "metadata").is_empty());
    }

    #[test]
    fn test_resolve_choice_is_case_insensitive() {
        let options = vec![DecisionOption::new("Buy"), DecisionOption::new("Sell")];
        assert_eq!(resolve_choice(&options, " buy "), Some("Buy".to_string()));
        assert_eq!(resolve_choice(&options, "hold"), None);
    }
}
