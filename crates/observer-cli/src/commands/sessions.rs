use super::build_service;
use anyhow::{Context, Result};
use colored::Colorize;
use observer_core::config::ObserverConfig;
use observer_core::session::{SessionState, SessionSummary};

pub fn run(config: ObserverConfig, open_only: bool) -> Result<()> {
    let service = build_service(config)?;
    service.load_history().context("Failed to read stored sessions")?;

    let summaries: Vec<SessionSummary> = service
        .list_sessions()?
        .into_iter()
        .filter(|s| !open_only || s.state == SessionState::Open)
        .collect();

    if summaries.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }
    for summary in &summaries {
        println!("{}", format_summary(summary));
    }
    Ok(())
}

fn format_summary(summary: &SessionSummary) -> String {
    let state = match summary.state {
        SessionState::Open => format!("{:<6}", summary.state).yellow(),
        SessionState::Closed => format!("{:<6}", summary.state).dimmed(),
    };
    let mut averages = String::new();
    if let Some(ms) = summary.averages.response_time_ms {
        averages.push_str(&format!(", avg {:.0}ms", ms));
    }
    if let Some(tokens) = summary.averages.token_usage {
        averages.push_str(&format!(", avg {:.0} tokens", tokens));
    }
    format!(
        "{}  {}  {}  {} decisions, {} agents, {:.1}s{}  {}",
        summary.id,
        state,
        summary.opened_at.format("%Y-%m-%d %H:%M:%S"),
        summary.decision_count,
        summary.agents.len(),
        summary.duration_secs,
        averages,
        summary.label.bold()
    )
}
