use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sha2::{Digest, Sha256};
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use seedkeeper_core::{
    load_config, validate_config, MaintenanceRunner, QBittorrentClient, RunOutcome,
    SanitizedConfig, TorrentClient,
};

/// Operation run when none is named.
const DEFAULT_OPERATION: &str = "unregistered";

#[derive(Debug, Parser)]
#[command(version, about = "Maintenance automation for qBittorrent")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "SEEDKEEPER_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Preview the impact without changing anything.
    #[arg(long)]
    dry_run: bool,

    /// Show hashes in the dry-run preview.
    #[arg(long)]
    details: bool,

    /// Log as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Increase verbosity (-v, -vv). Default INFO.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Operations to run, e.g. `unregistered tag_by_tracker`.
    #[arg(value_name = "OPERATION")]
    operations: Vec<String>,
}

impl Cli {
    fn operations(&self) -> Vec<String> {
        if self.operations.is_empty() {
            vec![DEFAULT_OPERATION.to_string()]
        } else {
            self.operations.clone()
        }
    }

    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "Configuration loaded (hash {}): {}",
        &config_hash[..16],
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    info!("Connecting to qBittorrent at {}", config.qbittorrent.url);
    let client: Arc<dyn TorrentClient> = Arc::new(
        QBittorrentClient::new(config.qbittorrent.clone())
            .context("Failed to create qBittorrent client")?,
    );

    let operations = cli.operations();
    let dry_run = cli.dry_run || config.dry_run;
    let runner = MaintenanceRunner::new(client, config);

    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("run", run_id = %run_id);
    let outcome = runner
        .run(&operations, dry_run)
        .instrument(span)
        .await
        .context("Maintenance run failed")?;

    match outcome {
        RunOutcome::Preview(summary) => println!("{}", summary.format_summary(cli.details)),
        RunOutcome::Applied(report) => {
            println!("{}", report);
            if report.has_failures() {
                warn!(
                    "Run finished with {} failed operations",
                    report.total_failed() + report.quarantine_failures.len()
                );
            }
        }
    }

    Ok(())
}
