use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spike_drive::config::RobotConfig;
use spike_drive::messages::DriveCommand;
use spike_drive::motor::PortId;
use spike_drive::runtime::{self, RunOptions};

/// Drive a motion plan on a simulated two-wheel SPIKE base
#[derive(Parser, Debug)]
#[command(name = "spike-drive", version)]
struct Args {
    /// JSON file with the list of drive commands
    plan: PathBuf,

    /// Robot config (JSON); the default robot is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop the plan at the first step that stalls or is interrupted
    #[arg(long)]
    halt_on_stall: bool,

    /// Make the motor on this port (A-F) stall on its next move
    #[arg(long, value_name = "PORT")]
    stall: Option<PortId>,
}

fn load(args: &Args) -> Result<(RobotConfig, Vec<DriveCommand>), Box<dyn std::error::Error + Send + Sync>> {
    let config = match &args.config {
        Some(path) => RobotConfig::load(path)?,
        None => RobotConfig::default(),
    };
    let text = std::fs::read_to_string(&args.plan)?;
    let plan = DriveCommand::parse_plan(&text)?;
    Ok((config, plan))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let (config, plan) = match load(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load {}: {}", args.plan.display(), e);
            std::process::exit(1);
        }
    };
    info!("Loaded {} steps from {}", plan.len(), args.plan.display());

    let options = RunOptions {
        halt_on_stall: args.halt_on_stall,
        stall: args.stall,
    };
    if let Err(e) = runtime::run(&config, &plan, options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
