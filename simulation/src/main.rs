//! dtnsim command line
//!
//! Runs a scenario described by a settings file, validates one, or runs a
//! built-in scenario and prints its summary.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dtnsim_logging::{LogConfig, SimSubscriberBuilder};
use dtnsim_simulation::{Scenario, scenarios};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "dtnsim",
    about = "Delay-tolerant network simulator",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Logging configuration as JSON
    #[arg(long, global = true)]
    log_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scenario described by a settings file
    Run {
        /// Settings file
        config: PathBuf,

        /// Directory for report files (overrides Report.reportDir)
        #[arg(short, long)]
        report_dir: Option<PathBuf>,

        /// Simulated end time in seconds (overrides Scenario.endTime)
        #[arg(short, long)]
        end_time: Option<f64>,
    },

    /// Parse a settings file and build its world without running it
    Validate {
        /// Settings file
        config: PathBuf,
    },

    /// Run a built-in scenario
    Scenario {
        /// One of: two_nodes, two_nodes_snf, out_of_range, bridge,
        /// epidemic_cure, community_formation, spray_and_focus_halving, pubsub
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.log_config {
        Some(path) => LogConfig::from_json_file(path)
            .with_context(|| format!("Failed to read log config {}", path.display()))?,
        None if cli.verbose => LogConfig::development(),
        None => LogConfig::default(),
    };
    let mut builder = SimSubscriberBuilder::new().with_config(config);
    if cli.verbose {
        builder = builder.with_level("debug");
    } else if cli.log_config.is_none() {
        builder = builder.with_level("warn");
    }
    let _guard = builder.init();

    match cli.command {
        Commands::Run {
            config,
            report_dir,
            end_time,
        } => {
            let mut scenario = Scenario::load(&config)
                .with_context(|| format!("Invalid scenario {}", config.display()))?;
            let world = &mut scenario.world;
            let end = end_time.unwrap_or(world.config().end_time);
            world
                .run_until(end)
                .with_context(|| format!("Simulation of {} aborted", world.name()))?;
            let dir = report_dir.unwrap_or(scenario.report_dir);
            let written = world
                .finish(&dir)
                .with_context(|| format!("Failed to write reports to {}", dir.display()))?;
            info!(reports = written.len(), "Done");
            for path in written {
                println!("{}", path.display());
            }
        }
        Commands::Validate { config } => {
            let scenario = Scenario::load(&config)
                .with_context(|| format!("Invalid scenario {}", config.display()))?;
            println!(
                "{}: {} hosts, end time {}s",
                scenario.world.name(),
                scenario.world.host_count(),
                scenario.world.config().end_time
            );
        }
        Commands::Scenario { name } => {
            scenarios::run_builtin(&name).with_context(|| format!("Scenario {name} failed"))?;
        }
    }

    Ok(())
}
