//! rtnsim NCC beam scheduler
//!
//! This is the main binary for the DVB-RCS2 return-link NCC simulator. It
//! implements:
//! - CLI argument parsing
//! - Configuration loading and validation
//! - Task spawning and lifecycle management
//! - Graceful shutdown handling
//!
//! # Usage
//!
//! ```bash
//! rtn-ncc -c config/ncc.yaml
//! ```

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use rtnsim_common::logging::{init_logging, LogLevel};
use rtnsim_ncc::{
    load_and_validate_ncc_config, BeamSchedulerTask, NccTaskBase, PublisherTask, Task,
    DEFAULT_CHANNEL_CAPACITY,
};

/// rtnsim NCC - DVB-RCS2 return-link beam scheduler
#[derive(Parser, Debug)]
#[command(name = "rtn-ncc")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the NCC configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    println!("rtnsim NCC - DVB-RCS2 beam scheduler");
    println!("====================================");

    match run_ncc(args).await {
        Ok(()) => {
            info!("NCC exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("NCC failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main NCC execution logic
async fn run_ncc(args: Args) -> Result<()> {
    info!("Loading configuration from: {}", args.config_file);
    let config = load_and_validate_ncc_config(&args.config_file)
        .with_context(|| format!("Failed to load configuration from {}", args.config_file))?;

    info!(
        "Configuration loaded: beam={}, carriers={}, superframe={} ms, {} provisioned terminal(s)",
        config.beam_id,
        config.carrier_count(),
        config.superframe.duration_ms,
        config.terminals.len()
    );

    let (base, scheduler_rx, publisher_rx) = NccTaskBase::new(config, DEFAULT_CHANNEL_CAPACITY);

    // Spawn publisher task
    let mut publisher = PublisherTask::new(base.clone());
    tokio::spawn(async move {
        publisher.run(publisher_rx).await;
    });
    info!("Publisher task spawned");

    // Spawn scheduler task; a bad waveform table or geometry dies here
    let mut scheduler =
        BeamSchedulerTask::new(base.clone()).context("Failed to initialize beam scheduler")?;
    tokio::spawn(async move {
        scheduler.run(scheduler_rx).await;
    });
    info!("Scheduler task spawned");

    info!("NCC started, waiting for shutdown signal...");
    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received Ctrl+C, initiating shutdown...");

    base.shutdown_all().await;
    info!("All tasks signalled to shut down");

    Ok(())
}
