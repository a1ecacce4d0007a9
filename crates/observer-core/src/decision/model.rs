//! Decision record domain model.
//!
//! A `DecisionDraft` is what an adapter produces from raw agent output. The
//! session manager turns a draft into a `DecisionRecord` at record time by
//! assigning the identifier, the timestamp and the owning session.

use crate::error::{ObserverError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Free-form structured description of the situation an agent faced.
///
/// Keys are kept sorted so that two records with the same content serialize
/// identically.
pub type DecisionContext = Map<String, Value>;

/// One candidate outcome considered by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl DecisionOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            weight: None,
        }
    }

    pub fn weighted(label: impl Into<String>, weight: f64) -> Self {
        Self {
            label: label.into(),
            weight: Some(weight),
        }
    }
}

/// Outcome of a decision, reported after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Pending,
    Success,
    Failure,
}

impl OutcomeStatus {
    /// Success and failure are terminal; pending is not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        };
        f.write_str(s)
    }
}

impl FromStr for OutcomeStatus {
    type Err = ObserverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "success" | "succeeded" => Ok(Self::Success),
            "failure" | "failed" => Ok(Self::Failure),
            other => Err(ObserverError::invalid_record(format!(
                "unknown outcome status '{}'",
                other
            ))),
        }
    }
}

/// Measurements reported together with an outcome, such as latency or cost.
pub type PerformanceMetrics = Map<String, Value>;

/// An outcome transition, optionally carrying the measurements taken when
/// the outcome became known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeUpdate {
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PerformanceMetrics>,
}

impl OutcomeUpdate {
    pub fn new(status: OutcomeStatus) -> Self {
        Self {
            status,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: PerformanceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl From<OutcomeStatus> for OutcomeUpdate {
    fn from(status: OutcomeStatus) -> Self {
        Self::new(status)
    }
}

/// Measurements taken while the agent was deciding.
///
/// `response_time_ms` and `token_usage` feed the session averages; any other
/// entry is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u64>,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl DecisionMetadata {
    pub fn is_empty(&self) -> bool {
        self.response_time_ms.is_none() && self.token_usage.is_none() && self.extra.is_empty()
    }
}

/// An alternative weighed during one reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsideredAlternative {
    pub approach: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advantages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disadvantages: Vec<String>,
    /// Rating on a one-to-ten scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feasibility: Option<f64>,
}

impl ConsideredAlternative {
    pub fn new(approach: impl Into<String>) -> Self {
        Self {
            approach: approach.into(),
            advantages: Vec::new(),
            disadvantages: Vec::new(),
            feasibility: None,
        }
    }
}

/// One step of an agent's reasoning path, with the evidence it cited and the
/// alternatives it weighed. The step's prose lives in the record's reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionStep {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub evidence: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<ConsideredAlternative>,
}

impl DecisionStep {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            confidence: None,
            evidence: Map::new(),
            alternatives: Vec::new(),
        }
    }

    /// True when the step carries nothing beyond its label.
    pub fn is_bare(&self) -> bool {
        self.confidence.is_none() && self.evidence.is_empty() && self.alternatives.is_empty()
    }
}

/// Coarse confidence bucket used by agents that report labels instead of scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Buckets a score: below 0.4 is low, below 0.7 is medium.
    pub fn from_score(score: f64) -> Self {
        if score < 0.4 {
            Self::Low
        } else if score < 0.7 {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Parses a label, falling back to medium for anything unrecognised.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "LOW" => Self::Low,
            "HIGH" => Self::High,
            _ => Self::Medium,
        }
    }

    /// Representative score for a label, used when only a label is known.
    pub fn score(self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.85,
        }
    }
}

/// A normalized decision that has not yet been recorded into a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDraft {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default)]
    pub context: DecisionContext,
    pub options: Vec<DecisionOption>,
    pub chosen: String,
    /// Set when the agent acted outside its enumerated options.
    #[serde(default)]
    pub outside_options: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<DecisionStep>,
    /// Ids of earlier records this decision builds on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "DecisionMetadata::is_empty")]
    pub metadata: DecisionMetadata,
}

impl DecisionDraft {
    pub fn new(agent_id: impl Into<String>, chosen: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            task: None,
            context: DecisionContext::new(),
            options: Vec::new(),
            chosen: chosen.into(),
            outside_options: false,
            reasoning: String::new(),
            confidence: None,
            steps: Vec::new(),
            dependencies: Vec::new(),
            metadata: DecisionMetadata::default(),
        }
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_option(mut self, option: DecisionOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_options<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(labels.into_iter().map(DecisionOption::new));
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_step(mut self, step: DecisionStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_dependency(mut self, record_id: impl Into<String>) -> Self {
        self.dependencies.push(record_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: DecisionMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Marks the chosen value as lying outside the enumerated options.
    pub fn outside_options(mut self) -> Self {
        self.outside_options = true;
        self
    }

    /// Checks the required fields and their consistency.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` when:
    /// - `agent_id` or `chosen` is blank
    /// - `options` is empty and the outside-option flag is unset
    /// - option labels are blank or duplicated, or weights are not finite
    /// - `chosen` is not among `options` and the outside-option flag is unset
    /// - the outside-option flag is set but `chosen` is one of the options
    /// - `confidence` or a step confidence lies outside `[0, 1]`
    /// - a dependency id or an alternative's approach is blank
    /// - `response_time_ms` or a feasibility rating is negative or not finite
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(ObserverError::invalid_record("agent_id is empty"));
        }
        if self.chosen.trim().is_empty() {
            return Err(ObserverError::invalid_record("chosen option is missing"));
        }
        if self.options.is_empty() && !self.outside_options {
            return Err(ObserverError::invalid_record("options are missing"));
        }

        let mut seen = HashSet::new();
        for option in &self.options {
            if option.label.trim().is_empty() {
                return Err(ObserverError::invalid_record("option label is empty"));
            }
            if !seen.insert(option.label.as_str()) {
                return Err(ObserverError::invalid_record(format!(
                    "duplicate option label '{}'",
                    option.label
                )));
            }
            if let Some(weight) = option.weight {
                if !weight.is_finite() {
                    return Err(ObserverError::invalid_record(format!(
                        "weight of option '{}' is not finite",
                        option.label
                    )));
                }
            }
        }

        let is_member = seen.contains(self.chosen.as_str());
        match (is_member, self.outside_options) {
            (false, false) => {
                return Err(ObserverError::invalid_record(format!(
                    "chosen option '{}' is not among the options",
                    self.chosen
                )));
            }
            (true, true) => {
                return Err(ObserverError::invalid_record(format!(
                    "chosen option '{}' is flagged as outside the options but is one of them",
                    self.chosen
                )));
            }
            _ => {}
        }

        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(ObserverError::invalid_record(format!(
                    "confidence {} is outside [0, 1]",
                    confidence
                )));
            }
        }

        for step in &self.steps {
            if let Some(c) = step.confidence.filter(|c| !(0.0..=1.0).contains(c)) {
                return Err(ObserverError::invalid_record(format!(
                    "confidence {} of step '{}' is outside [0, 1]",
                    c, step.label
                )));
            }
            for alt in &step.alternatives {
                if alt.approach.trim().is_empty() {
                    return Err(ObserverError::invalid_record("alternative approach is empty"));
                }
                if alt.feasibility.is_some_and(|f| !f.is_finite() || f < 0.0) {
                    return Err(ObserverError::invalid_record(format!(
                        "feasibility of '{}' is not a rating",
                        alt.approach
                    )));
                }
            }
        }

        if self.dependencies.iter().any(|d| d.trim().is_empty()) {
            return Err(ObserverError::invalid_record("dependency id is empty"));
        }
        if let Some(ms) = self.metadata.response_time_ms {
            if !ms.is_finite() || ms < 0.0 {
                return Err(ObserverError::invalid_record(format!(
                    "response time {} is not a duration",
                    ms
                )));
            }
        }

        Ok(())
    }
}

/// The canonical record of one decision, owned by exactly one session.
///
/// Every field except `outcome` is fixed at creation. Records handed out by
/// the session manager are copies, so editing one never reaches the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default)]
    pub context: DecisionContext,
    pub options: Vec<DecisionOption>,
    pub chosen: String,
    #[serde(default)]
    pub outside_options: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<DecisionStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "DecisionMetadata::is_empty")]
    pub metadata: DecisionMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Option<PerformanceMetrics>,
}

impl DecisionRecord {
    /// Builds a record from a validated draft.
    ///
    /// The session manager is the normal caller; it assigns `id` and
    /// `timestamp`. Stores and tests use this to rebuild records directly.
    pub fn from_draft(
        draft: DecisionDraft,
        id: impl Into<String>,
        session_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            timestamp,
            agent_id: draft.agent_id,
            task: draft.task,
            context: draft.context,
            options: draft.options,
            chosen: draft.chosen,
            outside_options: draft.outside_options,
            reasoning: draft.reasoning,
            confidence: draft.confidence,
            steps: draft.steps,
            dependencies: draft.dependencies,
            metadata: draft.metadata,
            outcome: None,
            performance_metrics: None,
        }
    }

    /// The chosen option, or `None` when the agent acted outside its options.
    pub fn chosen_option(&self) -> Option<&DecisionOption> {
        self.options.iter().find(|o| o.label == self.chosen)
    }

    /// True once the outcome is success or failure.
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some_and(OutcomeStatus::is_terminal)
    }

    /// Applies an outcome transition.
    ///
    /// Allowed: unset to any status, pending to a terminal status. A terminal
    /// outcome never changes again. Metrics carried by the update replace the
    /// stored ones; an update without metrics keeps them.
    pub fn apply_outcome(&mut self, update: impl Into<OutcomeUpdate>) -> Result<()> {
        let update = update.into();
        if let Some(current) = self.outcome.filter(|s| s.is_terminal()) {
            return Err(ObserverError::OutcomeAlreadyFinal {
                record_id: self.id.clone(),
                status: current.to_string(),
            });
        }
        self.outcome = Some(update.status);
        if let Some(metrics) = update.metrics {
            self.performance_metrics = Some(metrics);
        }
        Ok(())
    }

    /// The adapter-provided content of the record, without the fields
    /// assigned at record time.
    pub fn draft(&self) -> DecisionDraft {
        DecisionDraft {
            agent_id: self.agent_id.clone(),
            task: self.task.clone(),
            context: self.context.clone(),
            options: self.options.clone(),
            chosen: self.chosen.clone(),
            outside_options: self.outside_options,
            reasoning: self.reasoning.clone(),
            confidence: self.confidence,
            steps: self.steps.clone(),
            dependencies: self.dependencies.clone(),
            metadata: self.metadata.clone(),
        }
    }
}
