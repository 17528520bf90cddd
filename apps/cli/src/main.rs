//! LedgerSoak CLI
//!
//! Soak tester for a multi-chain ledger cluster, live or simulated.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ledgersoak_client::{Connector, RpcConnector};
use ledgersoak_core::NodeEndpoint;
use ledgersoak_harness::Harness;
use ledgersoak_logging::{init_logging, LogLevel};
use ledgersoak_settings::{default_settings_path, Settings};
use ledgersoak_sim::SimCluster;

/// LedgerSoak - randomized workload and consistency checks for a ledger cluster
#[derive(Parser)]
#[command(name = "ledgersoak")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the soak test until Ctrl+C or the duration elapses
    Run {
        /// Node URIs, comma separated
        #[arg(short, long, value_delimiter = ',')]
        endpoints: Vec<String>,

        /// Number of actors, genesis included
        #[arg(short, long)]
        actors: Option<usize>,

        /// Run against an in-memory cluster of N nodes
        #[arg(long, value_name = "N", conflicts_with = "endpoints")]
        simulate: Option<usize>,

        /// Stop after this long (e.g. "30s", "2h")
        #[arg(short, long, value_parser = humantime::parse_duration)]
        duration: Option<Duration>,
    },

    /// Write a settings file with default values
    InitConfig {
        /// Destination (defaults to ./ledgersoak.json)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogLevel::from_verbose(cli.verbose));

    match cli.command {
        Commands::Run {
            endpoints,
            actors,
            simulate,
            duration,
        } => {
            let settings = load_settings(cli.config)?;
            run(settings, endpoints, actors, simulate, duration).await?;
        }
        Commands::InitConfig { path, force } => {
            let path = path.or(cli.config).unwrap_or_else(default_settings_path);
            init_config(path, force)?;
        }
    }

    Ok(())
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = path.unwrap_or_else(default_settings_path);
    Settings::load_from(&path).with_context(|| format!("Failed to load settings from {:?}", path))
}

fn init_config(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }
    Settings::default()
        .save_to(&path)
        .with_context(|| format!("Failed to write settings to {:?}", path))?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

async fn run(
    mut settings: Settings,
    endpoints: Vec<String>,
    actors: Option<usize>,
    simulate: Option<usize>,
    duration: Option<Duration>,
) -> Result<()> {
    if !endpoints.is_empty() {
        settings.network.endpoints = endpoints.into_iter().map(NodeEndpoint::new).collect();
    }
    if let Some(actors) = actors {
        settings.workload.actors = actors;
    }

    let simulated = simulate.is_some() || settings.network.endpoints.is_empty();
    let (connector, endpoints): (Arc<dyn Connector>, Vec<NodeEndpoint>) = if simulated {
        if let Some(nodes) = simulate {
            settings.simulation.nodes = nodes;
        }
        let cluster = SimCluster::new(settings.sim_config());
        info!(nodes = settings.simulation.nodes, "Using simulated cluster");
        let endpoints = cluster.endpoints();
        (Arc::new(cluster), endpoints)
    } else {
        info!(nodes = settings.network.endpoints.len(), "Using live cluster");
        (Arc::new(RpcConnector::new()), settings.network.endpoints.clone())
    };

    let config = settings.harness_config(endpoints);
    let harness = Harness::new(config, connector).context("Invalid harness configuration")?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone(), duration));

    info!(actors = settings.workload.actors, "Starting soak run. Press Ctrl+C to stop.");
    let report = harness.run(cancel).await.context("Soak run aborted")?;
    report.print();

    if report.has_violations() {
        bail!("{} consistency violation(s) detected", report.violations);
    }
    Ok(())
}

async fn cancel_on_shutdown(cancel: CancellationToken, duration: Option<Duration>) {
    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Received Ctrl+C, stopping actors");
        }
        _ = deadline => info!("Run duration elapsed, stopping actors"),
        _ = cancel.cancelled() => return,
    }
    cancel.cancel();
}
