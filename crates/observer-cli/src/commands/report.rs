use super::build_service;
use anyhow::{Context, Result};
use observer_core::analytics::{BucketWidth, MinSupport, RecordFilter};
use observer_core::config::ObserverConfig;

/// Filters and analytics overrides for one report.
#[derive(Debug, Default)]
pub struct ReportArgs {
    pub sessions: Vec<String>,
    pub agent: Option<String>,
    pub bucket_secs: Option<u64>,
    pub bucket_count: Option<usize>,
    pub min_support: Option<usize>,
}

impl ReportArgs {
    fn apply(&self, config: &mut ObserverConfig) -> Result<()> {
        if let Some(seconds) = self.bucket_secs {
            config.analytics.trend_bucket = BucketWidth::Duration { seconds };
        }
        if let Some(size) = self.bucket_count {
            config.analytics.trend_bucket = BucketWidth::Count { size };
        }
        if let Some(value) = self.min_support {
            config.analytics.min_support = MinSupport::Count { value };
        }
        config.validate().context("Invalid report options")?;
        Ok(())
    }

    fn filter(&self) -> RecordFilter {
        let filter = RecordFilter::new().sessions(self.sessions.iter().cloned());
        match &self.agent {
            Some(agent) => filter.agent(agent.clone()),
            None => filter,
        }
    }
}

pub fn run(mut config: ObserverConfig, args: ReportArgs) -> Result<()> {
    args.apply(&mut config)?;
    let service = build_service(config)?;
    let loaded = service.load_history().context("Failed to read stored sessions")?;
    tracing::debug!(loaded, "Computing report");

    let snapshot = service.snapshot(&args.filter())?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_configured_analytics() {
        let mut config = ObserverConfig::default();
        let args = ReportArgs {
            bucket_count: Some(10),
            min_support: Some(3),
            ..Default::default()
        };
        args.apply(&mut config).unwrap();
        assert_eq!(config.analytics.trend_bucket, BucketWidth::Count { size: 10 });
        assert_eq!(config.analytics.min_support, MinSupport::Count { value: 3 });
    }

    #[test]
    fn test_zero_overrides_are_rejected() {
        let mut config = ObserverConfig::default();
        let args = ReportArgs {
            bucket_secs: Some(0),
            ..Default::default()
        };
        assert!(args.apply(&mut config).is_err());
    }

    #[test]
    fn test_empty_session_list_admits_everything() {
        let filter = ReportArgs::default().filter();
        assert!(filter.admits_session("any"));

        let args = ReportArgs {
            sessions: vec!["s-1".into()],
            ..Default::default()
        };
        assert!(!args.filter().admits_session("s-2"));
    }
}
