//! CLI entry point for the tickbroker runner.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use tickbroker_runner::config::Config;
use tickbroker_runner::plan::Plan;
use tickbroker_runner::run::{self, RunOptions};

#[derive(Parser)]
#[command(name = "tickbroker")]
#[command(about = "Replay an order plan against a tick-driven simulation service")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open a session and replay the plan until the session ends
    Run {
        /// Path to plan.json
        plan: PathBuf,

        /// Show the plan without opening a session
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the time span of the service's data
    Dataset,

    /// Open a session and show its status
    Status,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Run { plan, dry_run } => {
            let order_plan = match Plan::load(&plan) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Error loading plan: {e}");
                    process::exit(1);
                }
            };
            let opts = RunOptions::from_config(&config, &plan.display().to_string(), dry_run);
            run::run(&config, &order_plan, &opts).map(|_| ())
        }
        Command::Dataset => run::show_dataset(&config),
        Command::Status => run::check_status(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(run::exit_code(&e));
    }
}
