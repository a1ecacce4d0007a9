use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use observer_core::config::{ObserverConfig, StorageBackend};
use observer_core::decision::OutcomeStatus;
use observer_infrastructure::ConfigLoader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "observer")]
#[command(about = "Agent Observer - records and analyses the decisions of autonomous agents", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "OBSERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Session directory; selects the json_dir store
    #[arg(long, global = true, env = "OBSERVER_STORE")]
    store: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record raw agent outputs from a JSON-lines file into a new session
    Ingest {
        /// Label of the session
        #[arg(long)]
        label: String,
        /// Agent id for lines that do not name their agent
        #[arg(long, default_value = "agent")]
        agent: String,
        file: PathBuf,
    },
    /// Set the outcome of a recorded decision
    Outcome {
        session: String,
        record: String,
        /// pending, success or failure
        status: OutcomeStatus,
        /// Performance metrics as a JSON object, e.g. '{"latency_ms": 120}'
        #[arg(long)]
        metrics: Option<String>,
    },
    /// List sessions
    Sessions {
        /// Only show open sessions
        #[arg(long)]
        open: bool,
    },
    /// Print a metric snapshot as JSON
    Report {
        /// Restrict to a session (repeatable)
        #[arg(long = "session")]
        sessions: Vec<String>,
        /// Restrict to an agent
        #[arg(long)]
        agent: Option<String>,
        /// Trend bucket width in seconds
        #[arg(long, conflicts_with = "bucket_count")]
        bucket_secs: Option<u64>,
        /// Trend bucket size in records
        #[arg(long)]
        bucket_count: Option<usize>,
        /// Minimum number of records for a pattern
        #[arg(long)]
        min_support: Option<usize>,
    },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<ObserverConfig> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::new(path),
        None => ConfigLoader::default_location()?,
    };
    let mut config = loader
        .load()
        .with_context(|| format!("Failed to load configuration from {}", loader.path().display()))?;

    if let Some(dir) = &cli.store {
        config.storage.backend = StorageBackend::JsonDir;
        config.storage.path = Some(dir.clone());
    }
    if config.storage.backend == StorageBackend::Memory {
        tracing::warn!("Using the in-memory store; sessions are discarded on exit");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Ingest { label, agent, file } => {
            commands::ingest::run(config, &label, &agent, &file).await?
        }
        Commands::Outcome {
            session,
            record,
            status,
            metrics,
        } => commands::outcome::run(config, &session, &record, status, metrics.as_deref())?,
        Commands::Sessions { open } => commands::sessions::run(config, open)?,
        Commands::Report {
            sessions,
            agent,
            bucket_secs,
            bucket_count,
            min_support,
        } => commands::report::run(
            config,
            commands::report::ReportArgs {
                sessions,
                agent,
                bucket_secs,
                bucket_count,
                min_support,
            },
        )?,
    }

    Ok(())
}
