//! Picket Scenario CLI
//!
//! Run scripted sensor scenarios through the fusion/scoring pipeline and
//! print the resulting picture.

use clap::Parser;
use picket_sim::{run_scenario, RunConfig, ScenarioId};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "picket-sim",
    about = "Drive scripted scenarios through the Picket fusion/scoring pipeline"
)]
struct Args {
    /// Scenario to run
    #[arg(short = 'S', long, value_enum, default_value = "mixed")]
    scenario: ScenarioId,

    /// Master seed (same seed, same picture)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of observation waves
    #[arg(short, long, default_value = "3")]
    waves: u32,

    /// Optional JSON rule-set file, re-read on every scoring call
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!(
        scenario = args.scenario.name(),
        seed = args.seed,
        waves = args.waves,
        "starting scenario run"
    );

    let config = RunConfig {
        scenario: args.scenario,
        seed: args.seed,
        waves: args.waves,
        rules_path: args.rules,
    };

    let report = match run_scenario(&config).await {
        Ok(report) => report,
        Err(e) => {
            error!("scenario failed: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("failed to serialize report: {}", e);
            std::process::exit(1);
        }
    }
}
