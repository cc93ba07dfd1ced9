//! Strand command-line runner
//!
//! Runs the built-in demo jobs on a strand scheduler and prints their
//! results.

mod commands;
mod demos;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strand")]
#[command(about = "Run jobs on a cooperative single-threaded scheduler", long_about = None)]
#[command(version)]
struct Cli {
    /// Log scheduler and job activity (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more jobs concurrently
    Run {
        /// Job names (see `strand list`); a name may be given more than once
        #[arg(required = true)]
        jobs: Vec<String>,
        /// Scheduler config file (defaults to ./strand.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Use a virtual clock: sleeps complete instantly
        #[arg(long)]
        virtual_time: bool,
        /// Stop at the first failed job
        #[arg(long)]
        fail_fast: bool,
        /// Stop as soon as any job finishes
        #[arg(long)]
        first: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available jobs
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            jobs,
            config,
            virtual_time,
            fail_fast,
            first,
            json,
        } => commands::run::execute(commands::run::RunArgs {
            jobs,
            config,
            virtual_time,
            fail_fast,
            first,
            json,
        }),

        Commands::List { json } => commands::list::execute(json),
    }
}
