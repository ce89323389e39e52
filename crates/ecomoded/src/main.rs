//! ecomoded — the review app eco mode daemon.
//!
//! Stops every running review app on weekday evenings and brings them back
//! on weekday mornings:
//! - Scalingo client (token exchange, app listing, scale, operations)
//! - Review app orchestrator (fleet selection, scaling, paced restarts)
//! - Cron jobs (stop and restart schedules)
//!
//! # Usage
//!
//! ```text
//! SCALINGO_TOKEN=tk-us-… SCALINGO_API_URL=https://api.osc-fr1.scalingo.com \
//!     ecomoded run --time-zone Europe/Paris
//! ecomoded --config /etc/ecomode.toml stop-now
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ecomode_client::ScalingoClient;
use ecomode_jobs::{EcoModeManager, TokioCronEngine};
use ecomode_scaler::{CycleReport, ReviewAppOrchestrator};

use crate::config::{ConfigOverrides, EcoModeConfig};

const DEFAULT_LOG_FILTER: &str = "info,ecomoded=debug,ecomode=debug";

#[derive(Parser)]
#[command(name = "ecomoded", about = "Review app eco mode daemon")]
struct Cli {
    /// Path to an ecomode.toml file.
    #[arg(long, env = "ECOMODE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Schedule the stop and restart cycles and run until Ctrl-C.
    Run,
    /// Stop every running review app now, then exit.
    StopNow,
    /// Restart every review app now, then exit.
    RestartNow,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = EcoModeConfig::load(cli.config.as_deref(), &cli.overrides)?;

    match cli.command {
        Command::Run => run(config).await,
        Command::StopNow => {
            let report = orchestrator(&config)?.stop_all_review_apps().await?;
            finish_cycle("stop", &report)
        }
        Command::RestartNow => {
            let report = orchestrator(&config)?.restart_all_review_apps().await?;
            finish_cycle("restart", &report)
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

fn orchestrator(config: &EcoModeConfig) -> anyhow::Result<ReviewAppOrchestrator> {
    let client = Arc::new(ScalingoClient::with_auth_url(&config.scalingo.auth_url)?);
    Ok(ReviewAppOrchestrator::new(client, config.scaler_config()?))
}

async fn run(config: EcoModeConfig) -> anyhow::Result<()> {
    info!("eco mode daemon starting");

    let client = Arc::new(ScalingoClient::with_auth_url(&config.scalingo.auth_url)?);
    let engine = Arc::new(TokioCronEngine::start().await?);
    info!("cron engine started");

    let mut eco = EcoModeManager::for_control_plane(
        client,
        config.scaler_config()?,
        engine.clone(),
        config.job_schedule(),
    )?;

    let running = eco.start_eco_mode().await;
    if running == 0 {
        engine.shutdown().await?;
        anyhow::bail!("no job could be scheduled");
    }

    // ── Shutdown signal ────────────────────────────────────────

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    eco.stop_eco_mode().await;
    engine.shutdown().await?;

    info!("eco mode daemon stopped");
    Ok(())
}

fn finish_cycle(cycle: &str, report: &CycleReport) -> anyhow::Result<()> {
    if report.failed > 0 {
        warn!(%cycle, failed = report.failed, "some review apps could not be scaled");
        anyhow::bail!("{} of {} review apps failed to {cycle}", report.failed, report.candidates);
    }
    info!(%cycle, scaled = report.scaled, candidates = report.candidates, "cycle finished");
    Ok(())
}
