use super::build_service;
use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use observer_application::ObserverService;
use observer_core::config::ObserverConfig;
use observer_core::decision::{OutcomeStatus, OutcomeUpdate};
use observer_core::session::SessionHandle;
use serde_json::Value;
use std::path::Path;

/// One line of an ingest file.
#[derive(Debug, PartialEq)]
struct IngestEntry {
    agent_id: String,
    output: Value,
    outcome: Option<OutcomeUpdate>,
}

/// Totals of one ingest run.
#[derive(Debug, Default)]
struct IngestReport {
    session_id: String,
    recorded: usize,
    /// Recorded lines whose outcome could not be set
    outcome_not_set: usize,
    skipped: usize,
}

/// What became of a line that was recorded.
#[derive(Debug)]
enum LineResult {
    Recorded,
    OutcomeNotSet(anyhow::Error),
}

/// Parses a line that is either a raw agent output or an envelope
/// `{ "agent_id", "output", "outcome", "metrics" }`.
fn parse_line(line: &str, default_agent: &str) -> Result<IngestEntry> {
    let value: Value = serde_json::from_str(line).context("not valid JSON")?;
    let Some(envelope) = value.as_object().filter(|o| o.contains_key("output")) else {
        return Ok(IngestEntry {
            agent_id: default_agent.to_string(),
            output: value,
            outcome: None,
        });
    };

    let agent_id = match envelope.get("agent_id") {
        None | Some(Value::Null) => default_agent.to_string(),
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(other) => return Err(anyhow!("agent_id must be a non-empty string, got {}", other)),
    };
    let status = match envelope.get("outcome") {
        None | Some(Value::Null) => None,
        Some(Value::String(status)) => Some(status.parse::<OutcomeStatus>()?),
        Some(other) => return Err(anyhow!("outcome must be a string, got {}", other)),
    };
    let metrics = match envelope.get("metrics") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(other) => return Err(anyhow!("metrics must be an object, got {}", other)),
    };
    let outcome = match (status, metrics) {
        (Some(status), None) => Some(OutcomeUpdate::new(status)),
        (Some(status), Some(metrics)) => Some(OutcomeUpdate::new(status).with_metrics(metrics)),
        (None, Some(_)) => return Err(anyhow!("metrics given without an outcome")),
        (None, None) => None,
    };
    Ok(IngestEntry {
        agent_id,
        output: envelope.get("output").cloned().unwrap_or(Value::Null),
        outcome,
    })
}

/// Records one line. An error means nothing was recorded; a failed outcome
/// update after a successful record is reported as `OutcomeNotSet`.
fn ingest_line(
    service: &ObserverService,
    handle: &SessionHandle,
    line: &str,
    default_agent: &str,
) -> Result<LineResult> {
    let entry = parse_line(line, default_agent)?;
    let record = service.observe(handle, &entry.agent_id, &entry.output)?;
    let Some(update) = entry.outcome else {
        return Ok(LineResult::Recorded);
    };
    match service.update_outcome(handle.id(), &record.id, update) {
        Ok(_) => Ok(LineResult::Recorded),
        Err(e) => Ok(LineResult::OutcomeNotSet(
            anyhow::Error::new(e).context(format!("record {}", record.id)),
        )),
    }
}

pub async fn run(config: ObserverConfig, label: &str, default_agent: &str, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let service = build_service(config)?;

    let report = service
        .scoped(label, |handle: SessionHandle| {
            let service = service.clone();
            async move {
                let mut report = IngestReport {
                    session_id: handle.id().to_string(),
                    ..Default::default()
                };
                for (index, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match ingest_line(&service, &handle, line, default_agent) {
                        Ok(LineResult::Recorded) => report.recorded += 1,
                        Ok(LineResult::OutcomeNotSet(e)) => {
                            report.recorded += 1;
                            report.outcome_not_set += 1;
                            eprintln!(
                                "{} line {}: recorded, outcome not set: {:#}",
                                "warning".yellow(),
                                index + 1,
                                e
                            );
                        }
                        Err(e) => {
                            report.skipped += 1;
                            eprintln!("{} line {}: {:#}", "skipped".yellow(), index + 1, e);
                        }
                    }
                }
                Ok::<_, anyhow::Error>(report)
            }
        })
        .await?;

    println!(
        "{} session {} ({}): {} recorded ({} without outcome), {} skipped",
        "✓".green(),
        report.session_id.bold(),
        label,
        report.recorded,
        report.outcome_not_set,
        report.skipped
    );
    Ok(())
}
