//! fleetd — the Fleet framework scheduler daemon.
//!
//! Assembles the scheduler from its parts:
//! - Configuration (fleet.toml → task requirement + initial instance count)
//! - State repository (redb)
//! - Scheduler core (offer matching, write-before-launch)
//! - Cluster driver
//!
//! # Usage
//!
//! ```text
//! fleetd replay --config fleet.toml --data-dir /var/lib/fleet --events offers.jsonl
//! fleetd state --data-dir /var/lib/fleet
//! ```

mod driver;
mod replay;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use fleet_core::FleetConfig;
use fleet_scheduler::{InstanceCount, OfferMatcher, SchedulerCore};
use fleet_state::{RedbStateRepository, StateRepository};
use serde_json::json;
use tracing::info;

use crate::driver::LoggingDriver;

const DB_FILE: &str = "fleet.redb";

#[derive(Parser)]
#[command(name = "fleetd", about = "Fleet framework scheduler daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Feed a recorded event stream through the scheduler, printing every
    /// driver instruction as a JSON line.
    Replay {
        /// Path to fleet.toml.
        #[arg(long, default_value = "fleet.toml")]
        config: PathBuf,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/fleet")]
        data_dir: PathBuf,

        /// JSON-lines event file.
        #[arg(long)]
        events: PathBuf,

        /// Override the configured desired instance count.
        #[arg(long)]
        instances: Option<u32>,
    },

    /// Print the persisted framework id and task descriptors.
    State {
        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/fleet")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries driver instructions.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,fleetd=debug,fleet_scheduler=debug,fleet_state=debug",
                )
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            config,
            data_dir,
            events,
            instances,
        } => run_replay(&config, &data_dir, &events, instances).await,
        Command::State { data_dir } => print_state(&data_dir),
    }
}

async fn run_replay(
    config_path: &Path,
    data_dir: &Path,
    events: &Path,
    instances: Option<u32>,
) -> anyhow::Result<()> {
    // Configuration errors are fatal before any offer is seen.
    let config = FleetConfig::from_file(config_path)?;
    let requirement = config.task_requirement()?;
    let desired = instances.unwrap_or(config.task.instances);
    info!(
        framework = %config.framework.name,
        role = config.framework.role(),
        user = config.framework.user(),
        task = %requirement.name(),
        desired,
        "configuration loaded"
    );

    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join(DB_FILE);
    let state = RedbStateRepository::open(&db_path)?;
    info!(path = ?db_path, "state repository opened");

    let core = SchedulerCore::new(
        requirement,
        Arc::new(InstanceCount::new(desired)),
        OfferMatcher::new(),
        Arc::new(state),
        Arc::new(LoggingDriver::new(std::io::stdout())),
    );
    let running = core.recover().await?;
    info!(running, desired, "scheduler ready");

    let input = BufReader::new(File::open(events)?);
    let summary = replay::replay(&core, input).await?;
    let running = core.running_count().await;

    info!(
        batches = summary.batches,
        launched = summary.tasks_launched,
        declined = summary.offers_declined,
        persistence_failures = summary.persistence_failures,
        terminated = summary.tasks_terminated,
        running,
        "replay finished"
    );
    Ok(())
}

fn print_state(data_dir: &Path) -> anyhow::Result<()> {
    let db_path = data_dir.join(DB_FILE);
    // Opening would create an empty database and hide a wrong --data-dir.
    if !db_path.exists() {
        bail!("no state database at {}", db_path.display());
    }
    let state = RedbStateRepository::open(&db_path)?;
    let framework_id = state.framework_id()?;
    let tasks = state.all_task_infos()?;

    let dump = json!({
        "framework_id": framework_id,
        "tasks": tasks,
    });
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}
