//! RTS behavior runtime - development tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rts_tools::run::{run_scenario, RunOptions};
use rts_tools::validate::validate_gameset;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rts-tools")]
#[command(about = "Gameset validator and headless scenario runner")]
struct Cli {
    /// Print machine-readable JSON instead of log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and compile a gameset, reporting content errors
    Validate {
        /// Gameset file
        gameset: PathBuf,
    },
    /// Run a scenario headless
    Run {
        /// Gameset file
        gameset: PathBuf,
        /// Scenario file
        scenario: PathBuf,
        /// Ticks to simulate
        #[arg(long, default_value_t = 600)]
        ticks: u64,
        /// Simulation config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// RNG seed override
        #[arg(long)]
        seed: Option<u64>,
        /// Write a replay log here
        #[arg(long)]
        replay: Option<PathBuf>,
    },
}

fn execute(cli: Cli) -> rts_tools::Result<()> {
    match cli.command {
        Commands::Validate { gameset } => {
            let report = validate_gameset(&gameset)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                tracing::info!(
                    objects = report.objects,
                    orders = report.orders,
                    tasks = report.tasks,
                    "Validation passed"
                );
            }
        }
        Commands::Run {
            gameset,
            scenario,
            ticks,
            config,
            seed,
            replay,
        } => {
            let summary = run_scenario(&RunOptions {
                gameset,
                scenario,
                ticks,
                config,
                seed,
                replay,
            })?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                tracing::info!(
                    ticks = summary.ticks,
                    hash = format_args!("{:016x}", summary.final_hash),
                    objects = summary.objects,
                    idle_edges = summary.idle_edges,
                    "Run finished"
                );
            }
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = execute(Cli::parse()) {
        tracing::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
