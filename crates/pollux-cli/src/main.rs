//! Pollux Command-Line Interface
//!
//! Submits work units to a backend, polls them to completion and records
//! their outcomes under `~/.pollux/`.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{backends, result, run, version};

/// Pollux - run work units on remote backends and track their outcomes
#[derive(Parser)]
#[command(name = "pollux")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (defaults to config.yaml in the state directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a work unit and wait for its outcome
    Run {
        /// Payload (JSON, or plain text)
        #[arg(short, long)]
        payload: String,

        /// Work unit id (generated if omitted)
        #[arg(long)]
        id: Option<String>,

        /// Execution parameter as key=value (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,

        /// Backend to use (simulator, http)
        #[arg(short, long)]
        backend: Option<String>,

        /// Overall timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Show the recorded outcome of a work unit
    Result {
        /// Work unit id
        id: String,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// List available backends
    Backends,

    /// Show version information
    Version,
}

fn log_filter(verbose: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_target(false)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run {
            payload,
            id,
            params,
            backend,
            timeout_ms,
        } => {
            run::execute(run::RunOptions {
                payload: &payload,
                id: id.as_deref(),
                params: &params,
                backend: backend.as_deref(),
                config,
                timeout_ms,
            })
            .await
        }

        Commands::Result { id, format } => result::execute(&id, &format, config).await,

        Commands::Backends => backends::execute(config).await,

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
