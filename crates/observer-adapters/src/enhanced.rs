//! Adapter for reasoning agents that emit a structured decision path.
//!
//! The agent walks through analysis, alternatives, trade-offs and a final
//! decision. Alternatives arrive either structured, inside
//! `steps[].alternatives_considered`, or as raw model text in
//! `reasoning_chain.alternatives` using `START_ALTERNATIVE` / `END_ALTERNATIVE`
//! blocks. The final decision is either plain text or a `START_DECISION`
//! block with `Decision:`, `Confidence:` and `Reasoning:` lines.

use crate::value::{self, DEFAULT_FEASIBILITY};
use observer_core::adapter::DecisionAdapter;
use observer_core::decision::{
    ConsideredAlternative, DecisionDraft, DecisionOption, DecisionStep, ReasoningSegment,
    join_reasoning,
};
use observer_core::error::{ObserverError, Result};
use serde_json::Value;

const NAME: &str = "enhanced";

/// Label of the step holding alternatives parsed from reasoning text.
const TEXT_ALTERNATIVES_LABEL: &str = "alternatives";

/// Reasoning-chain entries rendered first, in this order.
const CHAIN_ORDER: [&str; 4] = ["initial_analysis", "alternatives", "tradeoffs", "final_reasoning"];

/// An alternative read from a `START_ALTERNATIVE` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAlternative {
    pub approach: String,
    pub advantages: Option<String>,
    pub disadvantages: Option<String>,
    pub feasibility: f64,
}

impl From<ParsedAlternative> for ConsideredAlternative {
    fn from(alt: ParsedAlternative) -> Self {
        Self {
            approach: alt.approach,
            advantages: alt.advantages.into_iter().collect(),
            disadvantages: alt.disadvantages.into_iter().collect(),
            feasibility: Some(alt.feasibility),
        }
    }
}

/// The contents of a `START_DECISION` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDecision {
    pub decision: String,
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
}

/// Reads a feasibility rating such as `8`, `8/10` or `8 out of 10`.
/// Anything unreadable rates as five.
pub fn parse_feasibility(text: &str) -> f64 {
    let numerator = if let Some((n, _)) = text.split_once('/') {
        n
    } else if let Some((n, _)) = text.split_once("out of") {
        n
    } else {
        text
    };
    numerator
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .unwrap_or(DEFAULT_FEASIBILITY)
}

fn line_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.strip_prefix(key)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(str::trim)
}

/// Parses every complete `START_ALTERNATIVE` ... `END_ALTERNATIVE` block.
///
/// Blocks without an `Approach:` line are skipped.
pub fn parse_alternatives(text: &str) -> Vec<ParsedAlternative> {
    let mut parsed = Vec::new();
    let mut current: Option<ParsedAlternative> = None;

    for line in text.lines().map(str::trim) {
        if line.starts_with("START_ALTERNATIVE") {
            current = Some(ParsedAlternative {
                approach: String::new(),
                advantages: None,
                disadvantages: None,
                feasibility: DEFAULT_FEASIBILITY,
            });
        } else if line.starts_with("END_ALTERNATIVE") {
            if let Some(alt) = current.take().filter(|a| !a.approach.is_empty()) {
                parsed.push(alt);
            }
        } else if let Some(alt) = current.as_mut() {
            if let Some(v) = line_value(line, "Approach") {
                alt.approach = v.to_string();
            } else if let Some(v) = line_value(line, "Advantages") {
                alt.advantages = Some(v.to_string());
            } else if let Some(v) = line_value(line, "Disadvantages") {
                alt.disadvantages = Some(v.to_string());
            } else if let Some(v) = line_value(line, "Feasibility") {
                alt.feasibility = parse_feasibility(v);
            }
        }
    }
    parsed
}

/// Parses a final-decision block. Returns `None` when there is no
/// non-empty `Decision:` line.
pub fn parse_decision(text: &str) -> Option<ParsedDecision> {
    let mut decision = None;
    let mut confidence = None;
    let mut reasoning = None;

    for line in text.lines().map(str::trim) {
        if let Some(v) = line_value(line, "Decision") {
            decision = Some(v.to_string());
        } else if let Some(v) = line_value(line, "Confidence") {
            confidence = v.parse::<f64>().ok();
        } else if let Some(v) = line_value(line, "Reasoning") {
            reasoning = Some(v.to_string());
        }
    }

    decision
        .filter(|d| !d.is_empty())
        .map(|decision| ParsedDecision {
            decision,
            confidence,
            reasoning: reasoning.filter(|r| !r.is_empty()),
        })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnhancedAdapter;

impl EnhancedAdapter {
    pub fn new() -> Self {
        Self
    }

    fn recognizes(raw: &Value) -> bool {
        raw.is_object()
            && ["final_decision", "reasoning_chain", "confidence_score"]
                .iter()
                .any(|k| raw.get(*k).is_some())
    }

    /// Structured steps, keeping those that carry more than a label.
    fn steps(raw: &Value) -> Vec<DecisionStep> {
        value::array(raw, "steps")
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let label = value::text_field(step, "thought").unwrap_or_else(|| format!("step-{}", index));
                value::step(label, step)
            })
            .filter(|step| !step.is_bare())
            .collect()
    }

    fn text_alternatives(raw: &Value) -> Vec<ConsideredAlternative> {
        let text = raw
            .get("reasoning_chain")
            .and_then(|chain| chain.get("alternatives"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        parse_alternatives(text).into_iter().map(Into::into).collect()
    }

    fn options<'a>(alternatives: impl IntoIterator<Item = &'a ConsideredAlternative>) -> Vec<DecisionOption> {
        let mut options = Vec::new();
        for alt in alternatives {
            value::push_unique(&mut options, value::alternative_option(alt));
        }
        options
    }

    fn reasoning(raw: &Value, block_reasoning: Option<&str>) -> String {
        let mut segments: Vec<ReasoningSegment> = value::array(raw, "steps")
            .iter()
            .filter_map(|step| {
                let label = value::text_field(step, "thought").unwrap_or_default();
                let text = value::text_field(step, "reasoning")?;
                Some(ReasoningSegment::new(label, text))
            })
            .collect();

        let chain = raw.get("reasoning_chain");
        match chain {
            Some(Value::Object(map)) => {
                for key in CHAIN_ORDER {
                    if let Some(v) = map.get(key) {
                        segments.extend(value::reasoning_segments(key, v));
                    }
                }
                for (key, v) in map.iter().filter(|(k, _)| !CHAIN_ORDER.contains(&k.as_str())) {
                    segments.extend(value::reasoning_segments(key, v));
                }
            }
            Some(other) => segments.extend(value::reasoning_segments("reasoning_chain", other)),
            None => {}
        }

        let has_final = chain
            .and_then(|c| c.get("final_reasoning"))
            .and_then(value::text)
            .is_some();
        if let (Some(text), false) = (block_reasoning, has_final) {
            segments.push(ReasoningSegment::new("final_reasoning", text));
        }
        join_reasoning(&segments)
    }
}

impl DecisionAdapter for EnhancedAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn normalize(&self, agent_id: &str, raw: &Value) -> Result<DecisionDraft> {
        if !Self::recognizes(raw) {
            return Err(ObserverError::unknown_input("not an enhanced decision path"));
        }

        let final_text = value::text_field(raw, "final_decision")
            .ok_or_else(|| ObserverError::unsupported_format(NAME, "final_decision is missing"))?;
        let block = parse_decision(&final_text);
        let chosen = block
            .as_ref()
            .map(|b| b.decision.clone())
            .unwrap_or(final_text);

        let mut steps = Self::steps(raw);
        let mut options = Self::options(steps.iter().flat_map(|step| &step.alternatives));
        if options.is_empty() {
            let parsed = Self::text_alternatives(raw);
            options = Self::options(&parsed);
            if !parsed.is_empty() {
                let mut step = DecisionStep::new(TEXT_ALTERNATIVES_LABEL);
                step.alternatives = parsed;
                steps.push(step);
            }
        }

        let mut draft = DecisionDraft::new(agent_id, chosen.as_str());
        match value::resolve_choice(&options, &chosen) {
            Some(label) => draft.chosen = label,
            None => draft = draft.outside_options(),
        }
        draft.options = options;

        draft.confidence = match value::confidence(NAME, raw, "confidence_score")? {
            Some(c) => Some(c),
            None => match block.as_ref().and_then(|b| b.confidence) {
                Some(c) if !(0.0..=1.0).contains(&c) => {
                    return Err(ObserverError::unsupported_format(
                        NAME,
                        format!("decision confidence {} is outside [0, 1]", c),
                    ));
                }
                other => other,
            },
        };
        draft.reasoning = Self::reasoning(raw, block.as_ref().and_then(|b| b.reasoning.as_deref()));
        draft.context = value::context(raw);
        draft.task = value::text_field(raw, "task");
        draft.steps = steps;
        draft.dependencies = value::dependencies(raw);
        draft.metadata = value::metadata(raw, "metadata");
        Ok(draft)
    }
}
