use super::build_service;
use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use observer_core::config::ObserverConfig;
use observer_core::decision::{OutcomeStatus, OutcomeUpdate, PerformanceMetrics};
use serde_json::Value;

/// Parses `--metrics`, which must be a JSON object.
fn parse_metrics(text: &str) -> Result<PerformanceMetrics> {
    match serde_json::from_str::<Value>(text).context("metrics are not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("metrics must be a JSON object, got {}", other)),
    }
}

pub fn run(
    config: ObserverConfig,
    session_id: &str,
    record_id: &str,
    status: OutcomeStatus,
    metrics: Option<&str>,
) -> Result<()> {
    let mut update = OutcomeUpdate::new(status);
    if let Some(text) = metrics {
        update = update.with_metrics(parse_metrics(text)?);
    }

    let service = build_service(config)?;
    let record = service
        .update_outcome(session_id, record_id, update)
        .with_context(|| format!("Failed to set outcome of {} in session {}", record_id, session_id))?;

    let status = match status {
        OutcomeStatus::Success => status.to_string().green(),
        OutcomeStatus::Failure => status.to_string().red(),
        OutcomeStatus::Pending => status.to_string().yellow(),
    };
    println!(
        "{} {} ({} chose {}) -> {}",
        "✓".green(),
        record.id,
        record.agent_id,
        record.chosen.bold(),
        status
    );
    if let Some(metrics) = &record.performance_metrics {
        println!("  metrics: {}", Value::Object(metrics.clone()));
    }
    Ok(())
}
