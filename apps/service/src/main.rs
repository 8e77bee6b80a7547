use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use homewatch_service::config::{self, Config};
use homewatch_service::monitoring::{
    MonitoringEngine, ServiceSnapshot, SweepOutcome, SweepReport, SweepScheduler,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "homewatch-service", version, about = "Health monitor for home lab services")]
struct Cli {
    /// Config file, defaults to $XDG_CONFIG_HOME/homewatch/config.toml
    #[arg(short, long, env = "HOMEWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep all services on the configured interval until interrupted
    Run,
    /// Sweep once and print a JSON summary of the results
    Check,
    /// Write an example config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the loaded configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run(load(&cli.config)?).await,
        Commands::Check => check(load(&cli.config)?).await,
        Commands::InitConfig { force } => init_config(&cli.config, force),
        Commands::ShowConfig => {
            println!("{}", load(&cli.config)?);
            Ok(())
        }
    }
}

fn load(path: &Option<PathBuf>) -> Result<Config> {
    Config::from_config(path.as_deref()).context("Failed to load configuration")
}

async fn run(config: Config) -> Result<()> {
    let engine = Arc::new(MonitoringEngine::new());
    let scheduler = SweepScheduler::from_config(engine, &config)?;
    let handle = scheduler.start();

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Interrupted, stopping scheduler");
    handle.abort();

    Ok(())
}

async fn check(config: Config) -> Result<()> {
    let engine = Arc::new(MonitoringEngine::new());
    let scheduler = SweepScheduler::from_config(Arc::clone(&engine), &config)?;

    let SweepOutcome::Completed(report) = scheduler.run_sweep().await else {
        bail!("sweep did not run");
    };

    let summary = summarize(&report, engine.service_snapshots().await);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// JSON printed by `check`: the sweep counts, the names of services found
/// down and every snapshot
fn summarize(report: &SweepReport, snapshots: Vec<ServiceSnapshot>) -> serde_json::Value {
    let down: Vec<String> = snapshots
        .iter()
        .filter(|snapshot| !snapshot.status.is_up())
        .map(|snapshot| snapshot.name.clone())
        .collect();

    serde_json::json!({
        "sweep": {
            "checked": report.checked,
            "up": report.up,
            "down": report.down,
            "unprobed": report.unprobed,
            "duration_ms": u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        },
        "down_services": down,
        "services": snapshots,
    })
}

fn init_config(path: &Option<PathBuf>, force: bool) -> Result<()> {
    let path = config::resolve_path(path.as_deref())?;

    if path.exists() {
        if !force {
            bail!("{} already exists, pass --force to overwrite", path.display());
        }
        warn!("Overwriting {}", path.display());
    }

    Config::example().write_config(&path)?;
    info!("Example config written to {}", path.display());

    Ok(())
}
